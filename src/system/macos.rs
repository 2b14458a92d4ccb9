//! Display brightness through IOKit.
//!
//! Walks the registered `IODisplayConnect` services and returns the first one
//! that answers the brightness parameter. Displays driven by newer graphics
//! stacks do not register that service, in which case the reading is absent.

use core_foundation::base::TCFType;
use core_foundation::string::{CFString, CFStringRef};
use std::ffi::{c_char, c_void};

type IoObject = u32;
type IoIterator = u32;
type KernReturn = i32;

const KERN_SUCCESS: KernReturn = 0;
/// `kIOMainPortDefault` is the null port.
const MAIN_PORT_DEFAULT: u32 = 0;

#[link(name = "IOKit", kind = "framework")]
extern "C" {
    fn IOServiceMatching(name: *const c_char) -> *mut c_void;
    fn IOServiceGetMatchingServices(
        main_port: u32,
        matching: *mut c_void,
        existing: *mut IoIterator,
    ) -> KernReturn;
    fn IOIteratorNext(iterator: IoIterator) -> IoObject;
    fn IOObjectRelease(object: IoObject) -> KernReturn;
    fn IODisplayGetFloatParameter(
        service: IoObject,
        options: u32,
        parameter_name: CFStringRef,
        value: *mut f32,
    ) -> KernReturn;
}

/// Releases an IOKit object when dropped.
struct Owned(IoObject);

impl Drop for Owned {
    fn drop(&mut self) {
        unsafe {
            IOObjectRelease(self.0);
        }
    }
}

pub(super) fn display_brightness() -> Option<f32> {
    let key = CFString::from_static_string("brightness");
    let mut iterator: IoIterator = 0;

    // SAFETY: the matching dictionary is consumed by
    // IOServiceGetMatchingServices; every returned object is released by `Owned`.
    unsafe {
        let matching = IOServiceMatching(b"IODisplayConnect\0".as_ptr() as *const c_char);
        if matching.is_null() {
            return None;
        }
        if IOServiceGetMatchingServices(MAIN_PORT_DEFAULT, matching, &mut iterator)
            != KERN_SUCCESS
        {
            return None;
        }
        let iterator = Owned(iterator);

        loop {
            let service = IOIteratorNext(iterator.0);
            if service == 0 {
                return None;
            }
            let service = Owned(service);

            let mut brightness: f32 = 0.0;
            if IODisplayGetFloatParameter(service.0, 0, key.as_concrete_TypeRef(), &mut brightness)
                == KERN_SUCCESS
            {
                return Some(brightness);
            }
        }
    }
}
