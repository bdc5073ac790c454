//! 错误类型
//!
//! 租赁服务直接使用共享库的错误分类。

pub use rental_shared::error::{ErrorKind, RentalError, Result};
