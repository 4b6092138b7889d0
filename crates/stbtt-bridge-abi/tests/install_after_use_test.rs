//! The host slot closes once the bridge has served an allocation.

use stbtt_bridge_abi::bridge_abi::{StbBridgeHostVTable, stb_bridge_install_host};
use stbtt_bridge_abi::malloc_abi::{stb_zig_free, stb_zig_malloc};
use stbtt_bridge_abi::{active_host_name, install_host};
use stbtt_bridge_membrane::{ArenaHost, BridgeError};

unsafe extern "C" fn never_allocate(_size: usize, _user: *mut std::ffi::c_void) -> *mut std::ffi::c_void {
    std::ptr::null_mut()
}

unsafe extern "C" fn never_release(_ptr: *mut std::ffi::c_void, _user: *mut std::ffi::c_void) {}

#[test]
fn install_after_first_allocation_fails() {
    // SAFETY: allocate/release pair through the default host.
    let ptr = unsafe { stb_zig_malloc(16, std::ptr::null_mut()) };
    assert!(!ptr.is_null());
    let default_host = active_host_name();
    assert!(default_host.is_some());

    assert_eq!(
        install_host(Box::new(ArenaHost::new())),
        Err(BridgeError::HostAlreadyInstalled)
    );
    let vtable = StbBridgeHostVTable {
        allocate: Some(never_allocate),
        release: Some(never_release),
    };
    // SAFETY: vtable is valid and complete.
    assert_eq!(unsafe { stb_bridge_install_host(&vtable) }, -2);
    assert_eq!(active_host_name(), default_host);

    // The buffer still goes back to the allocator that produced it.
    // SAFETY: ptr came from stb_zig_malloc.
    unsafe { stb_zig_free(ptr, std::ptr::null_mut()) };
}
