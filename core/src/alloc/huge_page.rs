//! Huge-page backed fixed-capacity array (spec §4.2).
//!
//! Backing storage for order records and book sides: a flat array mapped
//! from huge pages where the platform supports it, `madvise`d and
//! `mlock`ed so it never swaps. Only trivially constructible/destructible
//! element types are allowed (`T: Copy + Default`, no `Drop`), since the
//! array is populated by `mmap`'s zero-fill and never runs element
//! destructors on deallocation beyond `munmap`. Move-only; indexing is
//! unchecked on the hot path, matching spec §4.2 ("no bounds checks ...
//! indices come from the slot-ID pool").

use crate::error::{CoreError, CoreResult};
use std::marker::PhantomData;
use std::ptr::NonNull;

/// A fixed-capacity array of `len` elements of type `T`, backed by an
/// anonymous `mmap` region. `alloc(size, align, flags)` in the design
/// notes collapses here into a single typed constructor, since every
/// caller in this crate wants "N elements of T", not a raw byte range.
pub struct HugePageArray<T: Copy + Default> {
    ptr: NonNull<T>,
    len: usize,
    mapped_bytes: usize,
    _marker: PhantomData<T>,
}

// Safety: the mapping is exclusively owned by this `HugePageArray`; `T`
// being `Copy` rules out interior aliasing through `Drop`.
unsafe impl<T: Copy + Default + Send> Send for HugePageArray<T> {}
unsafe impl<T: Copy + Default + Sync> Sync for HugePageArray<T> {}

/// Hints requested of the mapping. Huge pages and locking are
/// best-effort: if the OS can't honor them we fall back to a normal
/// anonymous mapping rather than failing startup.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllocFlags {
    pub huge: bool,
    pub lock: bool,
    pub prefault: bool,
}

impl<T: Copy + Default> HugePageArray<T> {
    /// Allocates room for `len` elements of `T`, all zero-initialized
    /// (`T::default()` must correspond to the all-zero pattern for the
    /// zero-fill from `mmap` to be a valid `T`; this holds for every
    /// element type used in this crate — plain numeric/packed-struct
    /// records).
    pub fn new(len: usize, flags: AllocFlags) -> CoreResult<Self> {
        let elem_size = std::mem::size_of::<T>().max(1);
        let mapped_bytes = len
            .checked_mul(elem_size)
            .ok_or_else(|| CoreError::Allocation("length overflow".into()))?
            .max(1);

        let ptr = Self::map(mapped_bytes, flags)?;

        Ok(HugePageArray {
            ptr: NonNull::new(ptr as *mut T).expect("mmap returned null on success"),
            len,
            mapped_bytes,
            _marker: PhantomData,
        })
    }

    #[cfg(unix)]
    fn map(bytes: usize, flags: AllocFlags) -> CoreResult<*mut libc::c_void> {
        let mut mmap_flags = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
        #[cfg(target_os = "linux")]
        if flags.huge {
            mmap_flags |= libc::MAP_HUGETLB;
        }
        if flags.prefault {
            #[cfg(target_os = "linux")]
            {
                mmap_flags |= libc::MAP_POPULATE;
            }
        }

        let mut ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                bytes,
                libc::PROT_READ | libc::PROT_WRITE,
                mmap_flags,
                -1,
                0,
            )
        };

        if ptr == libc::MAP_FAILED && flags.huge {
            // Huge pages unavailable (no hugetlbfs pool reserved) — fall
            // back to a normal anonymous mapping rather than failing.
            tracing::warn!("huge page mapping failed, falling back to regular pages");
            let fallback_flags = mmap_flags & !libc::MAP_HUGETLB;
            ptr = unsafe {
                libc::mmap(
                    std::ptr::null_mut(),
                    bytes,
                    libc::PROT_READ | libc::PROT_WRITE,
                    fallback_flags,
                    -1,
                    0,
                )
            };
        }

        if ptr == libc::MAP_FAILED {
            return Err(CoreError::Allocation(format!(
                "mmap failed: {}",
                std::io::Error::last_os_error()
            )));
        }

        #[cfg(target_os = "linux")]
        if flags.huge {
            unsafe {
                libc::madvise(ptr, bytes, libc::MADV_HUGEPAGE);
            }
        }

        if flags.lock {
            let rc = unsafe { libc::mlock(ptr, bytes) };
            if rc != 0 {
                tracing::warn!("mlock failed, pages may be swappable");
            }
        }

        Ok(ptr)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Unchecked read. Caller guarantees `index < len()` — true by
    /// construction when `index` comes from the slot-ID pool that sized
    /// this array.
    #[inline]
    pub unsafe fn get_unchecked(&self, index: usize) -> &T {
        unsafe { &*self.ptr.as_ptr().add(index) }
    }

    /// Unchecked mutable access; same contract as [`get_unchecked`].
    #[inline]
    pub unsafe fn get_unchecked_mut(&mut self, index: usize) -> &mut T {
        unsafe { &mut *self.ptr.as_ptr().add(index) }
    }

    /// Bounds-checked access, for cold paths and tests.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        if index < self.len {
            Some(unsafe { self.get_unchecked(index) })
        } else {
            None
        }
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index < self.len {
            Some(unsafe { self.get_unchecked_mut(index) })
        } else {
            None
        }
    }
}

impl<T: Copy + Default> Drop for HugePageArray<T> {
    fn drop(&mut self) {
        #[cfg(unix)]
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.mapped_bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Default, PartialEq, Debug)]
    struct Rec {
        a: u64,
        b: u32,
    }

    #[test]
    fn zero_initialized_on_creation() {
        let arr: HugePageArray<Rec> = HugePageArray::new(16, AllocFlags::default()).unwrap();
        assert_eq!(*arr.get(0).unwrap(), Rec::default());
        assert_eq!(*arr.get(15).unwrap(), Rec::default());
        assert!(arr.get(16).is_none());
    }

    #[test]
    fn writes_are_visible_through_unchecked_access() {
        let mut arr: HugePageArray<Rec> = HugePageArray::new(8, AllocFlags::default()).unwrap();
        unsafe {
            *arr.get_unchecked_mut(3) = Rec { a: 7, b: 9 };
        }
        assert_eq!(*arr.get(3).unwrap(), Rec { a: 7, b: 9 });
    }

    #[test]
    fn huge_and_lock_flags_do_not_fail_allocation() {
        let flags = AllocFlags {
            huge: true,
            lock: true,
            prefault: true,
        };
        let arr: HugePageArray<Rec> = HugePageArray::new(1024, flags).unwrap();
        assert_eq!(arr.len(), 1024);
    }
}
