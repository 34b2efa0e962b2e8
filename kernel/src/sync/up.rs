use core::cell::{RefCell, RefMut};

/// 单处理器上的内核状态
///
/// 进程只在让出点切换，两个让出点之间对内核状态的访问是原子的。
/// 持有访问权时再次访问说明在不该让出的地方让出了，直接 panic。
#[derive(Debug)]
pub struct UpCell<T> {
    inner: RefCell<T>,
}

impl<T> UpCell<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: RefCell::new(value),
        }
    }

    /// Panic if the data has been borrowed.
    #[track_caller]
    pub fn exclusive_access(&self) -> RefMut<'_, T> {
        self.inner.borrow_mut()
    }

    #[track_caller]
    pub fn exclusive_session<F, V>(&self, f: F) -> V
    where
        F: FnOnce(&mut T) -> V,
    {
        let mut inner = self.exclusive_access();
        f(&mut inner)
    }
}
