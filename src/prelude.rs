pub use crate::error::{Bw64Error, Result as R};
pub use crate::fourcc::*;
pub use crate::safe_int::{safe_add, safe_cast, safe_mul, safe_sub};
pub use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

pub use std::io::{Cursor, Read, Seek, SeekFrom, Write};
pub use tracing::{debug, trace, warn};
