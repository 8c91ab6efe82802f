//! Scope-bound ownership of a single Vulkan handle.
//!
//! A `HandleGuard` pairs a handle with the call that destroys it. The destroy
//! callback runs once per live handle value: when the guard is dropped, when
//! the handle is replaced, or when a different handle is assigned. It never
//! runs on the null handle. Guards declared later drop first, so a stack of
//! guards tears down in reverse acquisition order.
//!
//! Construction code wraps each intermediate object in a guard so an early
//! `?` return cleans up, then calls [`HandleGuard::release`] once the object
//! has been handed to a longer-lived bundle.
use ash::vk::Handle;
use std::fmt;

pub struct HandleGuard<'a, H: Handle + Copy + PartialEq> {
    handle: H,
    destroy: Box<dyn FnMut(H) + 'a>,
}

fn null<H: Handle>() -> H {
    H::from_raw(0)
}

impl<'a, H: Handle + Copy + PartialEq> HandleGuard<'a, H> {
    /// Empty guard; fill it through [`replace`](Self::replace) or
    /// [`set`](Self::set).
    pub fn new(destroy: impl FnMut(H) + 'a) -> Self {
        HandleGuard {
            handle: null(),
            destroy: Box::new(destroy),
        }
    }

    pub fn with_handle(handle: H, destroy: impl FnMut(H) + 'a) -> Self {
        HandleGuard {
            handle,
            destroy: Box::new(destroy),
        }
    }

    pub fn get(&self) -> H {
        self.handle
    }

    pub fn is_null(&self) -> bool {
        self.handle.as_raw() == 0
    }

    /// Destroys the current handle and returns the emptied slot so an API
    /// call can write a new handle into it.
    pub fn replace(&mut self) -> &mut H {
        self.cleanup();
        &mut self.handle
    }

    /// Takes ownership of `handle`. Assigning the handle already held is a
    /// no-op; anything else destroys the old handle first.
    pub fn set(&mut self, handle: H) {
        if handle != self.handle {
            self.cleanup();
            self.handle = handle;
        }
    }

    /// Hands the handle out without destroying it.
    pub fn release(mut self) -> H {
        std::mem::replace(&mut self.handle, null())
    }

    fn cleanup(&mut self) {
        if !self.is_null() {
            (self.destroy)(self.handle);
        }
        self.handle = null();
    }
}

impl<H: Handle + Copy + PartialEq> Drop for HandleGuard<'_, H> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl<H: Handle + Copy + PartialEq + fmt::Debug> fmt::Debug for HandleGuard<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandleGuard").field(&self.handle).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;
    use std::cell::RefCell;

    fn fence(raw: u64) -> vk::Fence {
        vk::Fence::from_raw(raw)
    }

    #[test]
    fn replace_then_drop_destroys_each_handle_once() {
        let destroyed = RefCell::new(Vec::new());
        {
            let mut g = HandleGuard::with_handle(fence(1), |f: vk::Fence| {
                destroyed.borrow_mut().push(f.as_raw())
            });
            let slot = g.replace();
            assert_eq!(slot.as_raw(), 0);
            *slot = fence(2);
            assert_eq!(g.get(), fence(2));
        }
        assert_eq!(*destroyed.borrow(), vec![1, 2]);
    }

    #[test]
    fn null_handles_are_never_destroyed() {
        let calls = RefCell::new(0u32);
        {
            let mut g = HandleGuard::new(|_: vk::Semaphore| *calls.borrow_mut() += 1);
            assert!(g.is_null());
            g.replace();
            g.set(vk::Semaphore::null());
        }
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn assigning_the_same_handle_is_a_no_op() {
        let destroyed = RefCell::new(Vec::new());
        {
            let mut g = HandleGuard::new(|f: vk::Fence| destroyed.borrow_mut().push(f.as_raw()));
            g.set(fence(7));
            g.set(fence(7));
            assert!(destroyed.borrow().is_empty());
            g.set(fence(8));
            assert_eq!(*destroyed.borrow(), vec![7]);
        }
        assert_eq!(*destroyed.borrow(), vec![7, 8]);
    }

    #[test]
    fn released_handles_outlive_the_guard() {
        let calls = RefCell::new(0u32);
        let h = HandleGuard::with_handle(fence(3), |_| *calls.borrow_mut() += 1).release();
        assert_eq!(h, fence(3));
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn stacked_guards_unwind_in_reverse() {
        let order = RefCell::new(Vec::new());
        {
            let _a = HandleGuard::with_handle(fence(1), |f: vk::Fence| {
                order.borrow_mut().push(f.as_raw())
            });
            let _b = HandleGuard::with_handle(fence(2), |f: vk::Fence| {
                order.borrow_mut().push(f.as_raw())
            });
        }
        assert_eq!(*order.borrow(), vec![2, 1]);
    }
}
