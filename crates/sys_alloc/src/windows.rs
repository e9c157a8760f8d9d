use std::alloc::Layout;
use std::ffi::c_void;
use std::mem;

#[cfg(not(miri))]
use windows_sys::Win32::System::Memory::{GetProcessHeap, HeapAlloc, HeapFree};

/// `MEMORY_ALLOCATION_ALIGNMENT` for the process heap.
#[cfg(target_pointer_width = "64")]
const MIN_ALIGN: usize = 16;
#[cfg(not(target_pointer_width = "64"))]
const MIN_ALIGN: usize = 8;

#[cfg(not(miri))]
unsafe fn heap_alloc(size: usize) -> *mut u8 {
    unsafe { HeapAlloc(GetProcessHeap(), 0, size) }.cast::<u8>()
}

#[cfg(not(miri))]
unsafe fn heap_free(ptr: *mut u8) {
    unsafe {
        HeapFree(GetProcessHeap(), 0, ptr.cast::<c_void>().cast_const());
    }
}

/// Allocates a block for `layout`, returning null on failure.
///
/// Over-aligned requests are padded; the address returned by the heap is
/// stored in the word just below the aligned block.
///
/// # Safety
///
/// `layout.size()` must be non-zero.
pub unsafe fn alloc(layout: Layout) -> *mut u8 {
    #[cfg(miri)]
    {
        // Miri has no HeapAlloc shim.
        unsafe { std::alloc::alloc(layout) }
    }
    #[cfg(not(miri))]
    {
        if layout.align() <= MIN_ALIGN {
            return unsafe { heap_alloc(layout.size()) };
        }

        let Some(padded) = layout.size().checked_add(layout.align()) else {
            return std::ptr::null_mut();
        };
        let raw = unsafe { heap_alloc(padded) };
        if raw.is_null() {
            return raw;
        }

        // At least MIN_ALIGN bytes of slack sit below `aligned`, enough for
        // the header word.
        let offset = layout.align() - (raw as usize & (layout.align() - 1));
        unsafe {
            let aligned = raw.add(offset);
            aligned
                .sub(mem::size_of::<*mut u8>())
                .cast::<*mut u8>()
                .write_unaligned(raw);
            aligned
        }
    }
}

/// Frees a block obtained from [`alloc`] with the same `layout`.
///
/// # Safety
///
/// `ptr` must come from [`alloc`] with `layout` and not have been freed.
pub unsafe fn dealloc(ptr: *mut u8, layout: Layout) {
    #[cfg(miri)]
    {
        unsafe { std::alloc::dealloc(ptr, layout) }
    }
    #[cfg(not(miri))]
    {
        if layout.align() <= MIN_ALIGN {
            unsafe { heap_free(ptr) };
        } else {
            unsafe {
                let raw = ptr
                    .sub(mem::size_of::<*mut u8>())
                    .cast::<*mut u8>()
                    .read_unaligned();
                heap_free(raw);
            }
        }
    }
}
