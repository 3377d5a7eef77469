//! Edit transactions on connectivity arrays.

use std::ops::{Deref, DerefMut};

/// Scoped mutable access to one connectivity array.
///
/// Dropping the guard commits the edit and raises the array's edit flag, so
/// the next exchange update rebuilds whatever depends on it. [`restore`]
/// rolls the array back instead and raises nothing. The guard exposes a
/// slice, so the length can only change through `resize`.
///
/// [`restore`]: Edit::restore
pub struct Edit<'a, T: Clone> {
    data: &'a mut Vec<T>,
    backup: Vec<T>,
    flag: Option<&'a mut bool>,
}

impl<'a, T: Clone> Edit<'a, T> {
    pub(crate) fn new(data: &'a mut Vec<T>, flag: Option<&'a mut bool>) -> Self {
        let backup = data.clone();
        Self { data, backup, flag }
    }

    /// Discard every change made through this guard.
    pub fn restore(mut self) {
        std::mem::swap(self.data, &mut self.backup);
        self.flag = None;
    }

    /// Commit explicitly; equivalent to dropping the guard.
    pub fn commit(self) {}
}

impl<T: Clone> Deref for Edit<'_, T> {
    type Target = [T];
    fn deref(&self) -> &[T] {
        self.data
    }
}

impl<T: Clone> DerefMut for Edit<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.data
    }
}

impl<T: Clone> Drop for Edit<'_, T> {
    fn drop(&mut self) {
        if let Some(flag) = self.flag.take() {
            *flag = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_commits_and_flags() {
        let mut v = vec![1, 2, 3];
        let mut dirty = false;
        {
            let mut e = Edit::new(&mut v, Some(&mut dirty));
            e[1] = 20;
        }
        assert_eq!(v, vec![1, 20, 3]);
        assert!(dirty);
    }

    #[test]
    fn restore_rolls_back_silently() {
        let mut v = vec![1, 2, 3];
        let mut dirty = false;
        let mut e = Edit::new(&mut v, Some(&mut dirty));
        e[0] = 7;
        e.restore();
        assert_eq!(v, vec![1, 2, 3]);
        assert!(!dirty);
    }
}
