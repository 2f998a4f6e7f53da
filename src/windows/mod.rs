//! Native Fusion vendor module (Windows only)
//!
//! The vendor's managed assembly is reached through a thin C ABI shim DLL.
//! This module loads the shim at runtime and binds its `fusion_*` exports:
//!
//! | Export | Returns |
//! |---|---|
//! | `fusion_create(address)` | controller handle, null on failure |
//! | `fusion_destroy(handle)` | |
//! | `fusion_connect(handle)` | `1` connected, `0` declined, `< 0` error |
//! | `fusion_disconnect(handle)` | status |
//! | `fusion_last_error(handle)` | message for the last failure |
//! | `fusion_get_last_sale(handle, &sale)` | status, sale object |
//! | `fusion_get_last_sale_on_fusion(handle, &sale)` | status, sale object |
//! | `fusion_get_sale(handle, hose, number, &sale)` | status, sale object |
//! | `fusion_get_grade(handle, grade, &name)` | status, text |
//! | `fusion_period_status(handle, &text)` | status, text |
//! | `fusion_period_sales_by_grade(handle, type, id, &text)` | status, text |
//! | `fusion_sale_field_count(sale)` | field count |
//! | `fusion_sale_field_name(sale, index)` | text |
//! | `fusion_sale_field_value(sale, index)` | text, null for a null field |
//! | `fusion_sale_free(sale)` | |
//!
//! Status codes are `1` for a present value, `0` for no value, `-2` when the
//! controller link is lost and any other negative value for a vendor error.
//!
//! # Usage
//!
//! ```rust,ignore
//! use fusion_reader::windows::NativeLibrary;
//! use fusion_reader::vendor::VendorLibrary;
//!
//! let library = NativeLibrary::load(Path::new(r"C:\Wayne\FusionShim.dll"))?;
//! let mut session = library.open_session("192.168.1.100")?;
//! if session.connect()? {
//!     let sale = session.last_sale()?;
//! }
//! ```

mod library;

pub use library::NativeLibrary;
