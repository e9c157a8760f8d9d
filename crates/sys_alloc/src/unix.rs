use std::alloc::Layout;
use std::mem;
use std::ptr;

/// Alignment `malloc` guarantees for every block on this target.
#[cfg(target_pointer_width = "64")]
const MIN_ALIGN: usize = 16;
#[cfg(not(target_pointer_width = "64"))]
const MIN_ALIGN: usize = 8;

/// Allocates a block for `layout`, returning null on failure.
///
/// # Safety
///
/// `layout.size()` must be non-zero.
pub unsafe fn alloc(layout: Layout) -> *mut u8 {
    if layout.align() <= MIN_ALIGN && layout.align() <= layout.size() {
        return unsafe { libc::malloc(layout.size()) }.cast::<u8>();
    }

    // posix_memalign rejects alignments below the size of a pointer.
    let align = layout.align().max(mem::size_of::<usize>());
    let mut out = ptr::null_mut();
    let ret = unsafe { libc::posix_memalign(&mut out, align, layout.size()) };
    if ret == 0 {
        out.cast::<u8>()
    } else {
        ptr::null_mut()
    }
}

/// Frees a block obtained from [`alloc`].
///
/// # Safety
///
/// `ptr` must come from [`alloc`] and not have been freed.
pub unsafe fn dealloc(ptr: *mut u8, _layout: Layout) {
    unsafe { libc::free(ptr.cast::<libc::c_void>()) }
}
