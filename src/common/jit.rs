//! Executable memory for code encoded for the host architecture.

use std::marker::PhantomData;
use jit_allocator2::JitAllocator;

use crate::common::BuildError;
use crate::target::Isa;

/// Errors that can occur when turning encoded bytes into a callable function
#[derive(Debug, thiserror::Error)]
pub enum JitError {
    #[error("failed to allocate JIT memory: {0:?}")]
    AllocationFailed(jit_allocator2::Error),
    /// Code encoded for one ISA cannot run on a host of another
    #[error("code targets {0} but the host is not {0}")]
    ForeignTarget(Isa),
    #[error("cannot map an empty code sequence")]
    EmptyCode,
    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Copy `code` into a fresh executable mapping.
///
/// Returns the allocator that owns the mapping and the execute pointer.
fn map_code(isa: Isa, code: &[u8]) -> Result<(Box<JitAllocator>, *const u8), JitError> {
    if !isa.is_host() {
        return Err(JitError::ForeignTarget(isa));
    }
    if code.is_empty() {
        return Err(JitError::EmptyCode);
    }

    let mut allocator = JitAllocator::new(Default::default());
    let (exec_ptr, mut_ptr) = allocator.alloc(code.len()).map_err(JitError::AllocationFailed)?;

    // SAFETY: `mut_ptr` is a writable view of at least `code.len()` bytes
    // freshly returned by the allocator and cannot overlap `code`.
    unsafe {
        std::ptr::copy_nonoverlapping(code.as_ptr(), mut_ptr, code.len());
    }

    log::debug!("mapped {} bytes of {} code at {:p}", code.len(), isa, exec_ptr);
    Ok((allocator, exec_ptr))
}

/// Type-erased JIT function for signatures not covered by `CallableJitFunction`
pub struct RawCallableJitFunction {
    _allocator: Box<JitAllocator>,
    exec_ptr: *const u8,
}

impl RawCallableJitFunction {
    pub fn new(isa: Isa, code: &[u8]) -> Result<Self, JitError> {
        let (allocator, exec_ptr) = map_code(isa, code)?;
        Ok(Self {
            _allocator: allocator,
            exec_ptr,
        })
    }

    /// Reinterpret the entry point as a function pointer of type `F`.
    ///
    /// # Safety
    ///
    /// `F` must be an `extern "C"` function pointer type whose signature
    /// matches what the encoded code expects, and the returned pointer must
    /// not outlive `self`.
    pub unsafe fn as_fn<F: Copy>(&self) -> F {
        std::mem::transmute_copy(&self.exec_ptr)
    }
}

/// JIT function callable through `call()` for signatures `fn(..) -> R`
/// with up to four arguments, using the C ABI.
pub struct CallableJitFunction<F> {
    _allocator: Box<JitAllocator>,
    exec_ptr: *const u8,
    _phantom: PhantomData<F>,
}

impl<F> CallableJitFunction<F> {
    pub fn new(isa: Isa, code: &[u8]) -> Result<Self, JitError> {
        let (allocator, exec_ptr) = map_code(isa, code)?;
        Ok(Self {
            _allocator: allocator,
            exec_ptr,
            _phantom: PhantomData,
        })
    }
}

impl<R> CallableJitFunction<fn() -> R> {
    pub fn call(&self) -> R {
        let func: extern "C" fn() -> R = unsafe { std::mem::transmute_copy(&self.exec_ptr) };
        func()
    }
}

impl<A1, R> CallableJitFunction<fn(A1) -> R> {
    pub fn call(&self, arg1: A1) -> R {
        let func: extern "C" fn(A1) -> R = unsafe { std::mem::transmute_copy(&self.exec_ptr) };
        func(arg1)
    }
}

impl<A1, A2, R> CallableJitFunction<fn(A1, A2) -> R> {
    pub fn call(&self, arg1: A1, arg2: A2) -> R {
        let func: extern "C" fn(A1, A2) -> R = unsafe { std::mem::transmute_copy(&self.exec_ptr) };
        func(arg1, arg2)
    }
}

impl<A1, A2, A3, R> CallableJitFunction<fn(A1, A2, A3) -> R> {
    pub fn call(&self, arg1: A1, arg2: A2, arg3: A3) -> R {
        let func: extern "C" fn(A1, A2, A3) -> R = unsafe { std::mem::transmute_copy(&self.exec_ptr) };
        func(arg1, arg2, arg3)
    }
}

impl<A1, A2, A3, A4, R> CallableJitFunction<fn(A1, A2, A3, A4) -> R> {
    pub fn call(&self, arg1: A1, arg2: A2, arg3: A3, arg4: A4) -> R {
        let func: extern "C" fn(A1, A2, A3, A4) -> R = unsafe { std::mem::transmute_copy(&self.exec_ptr) };
        func(arg1, arg2, arg3, arg4)
    }
}
