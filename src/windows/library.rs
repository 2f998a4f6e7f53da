//! Native vendor module bound through `LoadLibraryW` / `GetProcAddress`

use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::Arc;

use tracing::{debug, trace, warn};
use windows::Win32::Foundation::{FreeLibrary, HMODULE};
use windows::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};
use windows::core::{PCSTR, PCWSTR};

use crate::types::{FieldValue, SaleObject};
use crate::vendor::{VendorLibrary, VendorSession};
use crate::{FusionError, Result};

/// Status code: value present / call succeeded
const STATUS_PRESENT: c_int = 1;
/// Status code: no value
const STATUS_ABSENT: c_int = 0;
/// Status code: the controller link is gone
const STATUS_CONNECTION_LOST: c_int = -2;

type CreateFn = unsafe extern "C" fn(address: *const c_char) -> *mut c_void;
type HandleFn = unsafe extern "C" fn(handle: *mut c_void) -> c_int;
type DestroyFn = unsafe extern "C" fn(handle: *mut c_void);
type LastErrorFn = unsafe extern "C" fn(handle: *mut c_void) -> *const c_char;
type SaleQueryFn = unsafe extern "C" fn(handle: *mut c_void, out: *mut *mut c_void) -> c_int;
type GetSaleFn = unsafe extern "C" fn(
    handle: *mut c_void,
    hose_id: u32,
    sale_number: u32,
    out: *mut *mut c_void,
) -> c_int;
type GetGradeFn =
    unsafe extern "C" fn(handle: *mut c_void, grade: u32, out: *mut *const c_char) -> c_int;
type TextQueryFn = unsafe extern "C" fn(handle: *mut c_void, out: *mut *const c_char) -> c_int;
type PeriodSalesFn = unsafe extern "C" fn(
    handle: *mut c_void,
    period_type: c_char,
    period_id: *const c_char,
    out: *mut *const c_char,
) -> c_int;
type FieldCountFn = unsafe extern "C" fn(sale: *mut c_void) -> u32;
type FieldTextFn = unsafe extern "C" fn(sale: *mut c_void, index: u32) -> *const c_char;
type SaleFreeFn = unsafe extern "C" fn(sale: *mut c_void);

/// Entry points of the vendor shim
///
/// Strings handed out by the shim stay valid until the next call on the same
/// handle (or, for sale fields, until the sale is freed).
struct Exports {
    create: CreateFn,
    destroy: DestroyFn,
    connect: HandleFn,
    disconnect: HandleFn,
    last_error: LastErrorFn,
    get_last_sale: SaleQueryFn,
    get_last_sale_on_fusion: SaleQueryFn,
    get_sale: GetSaleFn,
    get_grade: GetGradeFn,
    period_status: TextQueryFn,
    period_sales_by_grade: PeriodSalesFn,
    sale_field_count: FieldCountFn,
    sale_field_name: FieldTextFn,
    sale_field_value: FieldTextFn,
    sale_free: SaleFreeFn,
}

struct Module {
    handle: HMODULE,
    exports: Exports,
}

impl Drop for Module {
    fn drop(&mut self) {
        unsafe {
            let _ = FreeLibrary(self.handle);
        }
    }
}

// SAFETY: the module handle is process-global and the exports are plain
// function pointers; the shim serializes access per controller handle.
unsafe impl Send for Module {}
unsafe impl Sync for Module {}

/// The native Fusion vendor module
pub struct NativeLibrary {
    path: PathBuf,
    module: Arc<Module>,
}

impl NativeLibrary {
    /// Load the module and resolve every `fusion_*` export
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading native vendor module: {}", path.display());

        let wide = wide_path(path);
        let handle = unsafe { LoadLibraryW(PCWSTR::from_raw(wide.as_ptr())) }.map_err(|e| {
            FusionError::Load {
                path: path.to_path_buf(),
                reason: "LoadLibraryW failed".to_string(),
                source: Some(Box::new(FusionError::windows_api_error("LoadLibraryW", e))),
            }
        })?;

        let exports = match unsafe { resolve_exports(handle) } {
            Ok(exports) => exports,
            Err(symbol) => {
                unsafe {
                    let _ = FreeLibrary(handle);
                }
                return Err(FusionError::load_failed(
                    path,
                    format!("module does not export {}", symbol),
                ));
            }
        };

        debug!("Resolved vendor exports");
        Ok(Self { path: path.to_path_buf(), module: Arc::new(Module { handle, exports }) })
    }
}

impl VendorLibrary for NativeLibrary {
    fn describe(&self) -> String {
        format!("native vendor module {}", self.path.display())
    }

    fn open_session(&self, address: &str) -> Result<Box<dyn VendorSession>> {
        let c_address = CString::new(address).map_err(|_| {
            FusionError::connection_failed(format!("invalid controller address {:?}", address))
        })?;

        let exports = &self.module.exports;
        let raw = unsafe { (exports.create)(c_address.as_ptr()) };
        let Some(handle) = NonNull::new(raw) else {
            let message = unsafe { last_error(exports, std::ptr::null_mut()) };
            return Err(FusionError::connection_failed(format!(
                "vendor refused to create a controller handle: {}",
                message
            )));
        };

        trace!(address, "Native controller handle created");
        Ok(Box::new(NativeSession { module: Arc::clone(&self.module), handle }))
    }
}

struct NativeSession {
    module: Arc<Module>,
    handle: NonNull<c_void>,
}

// SAFETY: the handle is only used through `&mut self`, one call at a time.
unsafe impl Send for NativeSession {}

impl NativeSession {
    fn exports(&self) -> &Exports {
        &self.module.exports
    }

    fn raw(&self) -> *mut c_void {
        self.handle.as_ptr()
    }

    /// Map a status code to presence, or to an error carrying the vendor message
    fn check(&self, operation: &str, status: c_int) -> Result<bool> {
        match status {
            STATUS_PRESENT => Ok(true),
            STATUS_ABSENT => Ok(false),
            code => {
                let message = unsafe { last_error(self.exports(), self.raw()) };
                if code == STATUS_CONNECTION_LOST {
                    Err(FusionError::connection_failed(format!("{}: {}", operation, message)))
                } else {
                    Err(FusionError::operation_failed(
                        operation,
                        format!("{} (status {})", message, code),
                    ))
                }
            }
        }
    }

    fn sale_result(
        &self,
        operation: &str,
        status: c_int,
        out: *mut c_void,
    ) -> Result<Option<Box<dyn SaleObject>>> {
        if !self.check(operation, status)? {
            return Ok(None);
        }
        Ok(NonNull::new(out).map(|sale| {
            Box::new(NativeSale::read(self.exports(), sale)) as Box<dyn SaleObject>
        }))
    }

    fn text_result(
        &self,
        operation: &str,
        status: c_int,
        out: *const c_char,
    ) -> Result<Option<String>> {
        if !self.check(operation, status)? {
            return Ok(None);
        }
        Ok(unsafe { owned_text(out) })
    }
}

impl VendorSession for NativeSession {
    fn connect(&mut self) -> Result<bool> {
        let status = unsafe { (self.exports().connect)(self.raw()) };
        match status {
            STATUS_PRESENT => Ok(true),
            STATUS_ABSENT => Ok(false),
            code => {
                let message = unsafe { last_error(self.exports(), self.raw()) };
                Err(FusionError::connection_failed(format!("{} (status {})", message, code)))
            }
        }
    }

    fn disconnect(&mut self) -> Result<()> {
        let status = unsafe { (self.exports().disconnect)(self.raw()) };
        self.check("Disconnect", status).map(|_| ())
    }

    fn last_sale(&mut self) -> Result<Option<Box<dyn SaleObject>>> {
        let mut out = std::ptr::null_mut();
        let status = unsafe { (self.exports().get_last_sale)(self.raw(), &mut out) };
        self.sale_result("GetLastSale", status, out)
    }

    fn last_sale_on_fusion(&mut self) -> Result<Option<Box<dyn SaleObject>>> {
        let mut out = std::ptr::null_mut();
        let status = unsafe { (self.exports().get_last_sale_on_fusion)(self.raw(), &mut out) };
        self.sale_result("GetLastSaleOnFusion", status, out)
    }

    fn sale(&mut self, hose_id: u32, sale_number: u32) -> Result<Option<Box<dyn SaleObject>>> {
        let mut out = std::ptr::null_mut();
        let status =
            unsafe { (self.exports().get_sale)(self.raw(), hose_id, sale_number, &mut out) };
        self.sale_result("GetSale", status, out)
    }

    fn grade(&mut self, grade: u32) -> Result<Option<String>> {
        let mut out = std::ptr::null();
        let status = unsafe { (self.exports().get_grade)(self.raw(), grade, &mut out) };
        self.text_result("GetGrade", status, out)
    }

    fn period_status(&mut self) -> Result<Option<String>> {
        let mut out = std::ptr::null();
        let status = unsafe { (self.exports().period_status)(self.raw(), &mut out) };
        self.text_result("PeriodStatusRequest", status, out)
    }

    fn period_sales_by_grade(
        &mut self,
        period_type: char,
        period_id: &str,
    ) -> Result<Option<String>> {
        let code = u8::try_from(period_type).map_err(|_| {
            FusionError::operation_failed(
                "PeriodSalesByGrade",
                format!("period type {:?} is not ASCII", period_type),
            )
        })?;
        let id = CString::new(period_id).map_err(|_| {
            FusionError::operation_failed("PeriodSalesByGrade", "period id contains NUL")
        })?;

        let mut out = std::ptr::null();
        let status = unsafe {
            (self.exports().period_sales_by_grade)(
                self.raw(),
                code as c_char,
                id.as_ptr(),
                &mut out,
            )
        };
        self.text_result("PeriodSalesByGrade", status, out)
    }
}

impl Drop for NativeSession {
    fn drop(&mut self) {
        unsafe { (self.exports().destroy)(self.raw()) };
        trace!("Native controller handle destroyed");
    }
}

/// A sale copied out of a vendor sale object
///
/// Fields are read eagerly and the vendor object is freed right away. Values
/// are kept as the vendor's text.
struct NativeSale {
    fields: Vec<(String, String)>,
}

impl NativeSale {
    fn read(exports: &Exports, sale: NonNull<c_void>) -> Self {
        let raw = sale.as_ptr();
        let count = unsafe { (exports.sale_field_count)(raw) };
        let mut fields = Vec::with_capacity(count as usize);

        for index in 0..count {
            let name = unsafe { owned_text((exports.sale_field_name)(raw, index)) };
            let value = unsafe { owned_text((exports.sale_field_value)(raw, index)) };
            match (name, value) {
                (Some(name), Some(value)) => fields.push((name, value)),
                (Some(name), None) => trace!(field = %name, "Null sale field"),
                (None, _) => warn!(index, "Sale field without a name"),
            }
        }

        unsafe { (exports.sale_free)(raw) };
        Self { fields }
    }
}

impl SaleObject for NativeSale {
    fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|(name, _)| name.clone()).collect()
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| FieldValue::Text(v.clone()))
    }
}

/// Resolve every export, or name the first missing one
unsafe fn resolve_exports(module: HMODULE) -> std::result::Result<Exports, &'static str> {
    macro_rules! export {
        ($name:literal) => {{
            let symbol = concat!($name, "\0");
            match unsafe { GetProcAddress(module, PCSTR::from_raw(symbol.as_ptr())) } {
                // SAFETY: the shim declares this symbol with the matching signature
                Some(f) => unsafe { std::mem::transmute(f) },
                None => return Err($name),
            }
        }};
    }

    Ok(Exports {
        create: export!("fusion_create"),
        destroy: export!("fusion_destroy"),
        connect: export!("fusion_connect"),
        disconnect: export!("fusion_disconnect"),
        last_error: export!("fusion_last_error"),
        get_last_sale: export!("fusion_get_last_sale"),
        get_last_sale_on_fusion: export!("fusion_get_last_sale_on_fusion"),
        get_sale: export!("fusion_get_sale"),
        get_grade: export!("fusion_get_grade"),
        period_status: export!("fusion_period_status"),
        period_sales_by_grade: export!("fusion_period_sales_by_grade"),
        sale_field_count: export!("fusion_sale_field_count"),
        sale_field_name: export!("fusion_sale_field_name"),
        sale_field_value: export!("fusion_sale_field_value"),
        sale_free: export!("fusion_sale_free"),
    })
}

/// Vendor error message for a handle (or for a failed create when null)
unsafe fn last_error(exports: &Exports, handle: *mut c_void) -> String {
    unsafe { owned_text((exports.last_error)(handle)) }
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "unknown vendor error".to_string())
}

/// Copy a NUL-terminated string owned by the shim
unsafe fn owned_text(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let cstr = unsafe { CStr::from_ptr(ptr) };
    Some(cstr.to_string_lossy().into_owned())
}

/// Convert a path to a null-terminated wide string for Windows APIs
fn wide_path(path: &Path) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    path.as_os_str().encode_wide().chain(std::iter::once(0)).collect()
}
