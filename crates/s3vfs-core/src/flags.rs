//! Open flags and filesystem capabilities.

use bitflags::bitflags;

use crate::error::{FsError, FsResult};

/// Open for reading.
pub const O_RDONLY: i32 = 0;
/// Open for writing; the content is uploaded in one request on close.
pub const O_WRONLY: i32 = 1;
/// Open for writing; every write is uploaded as one multipart part.
pub const O_WRMULTIPART: i32 = 4;

/// The I/O mode a file handle was opened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// [`O_RDONLY`].
    Read,
    /// [`O_WRONLY`].
    Write,
    /// [`O_WRMULTIPART`].
    MultipartWrite,
}

impl OpenMode {
    /// Decode an open flag. Only exact mode values are accepted; flag
    /// combinations are rejected with [`FsError::UnsupportedFlag`].
    pub fn from_flag(flag: i32) -> FsResult<Self> {
        match flag {
            O_RDONLY => Ok(Self::Read),
            O_WRONLY => Ok(Self::Write),
            O_WRMULTIPART => Ok(Self::MultipartWrite),
            _ => Err(FsError::UnsupportedFlag { flag }),
        }
    }

    /// The flag value for this mode.
    #[must_use]
    pub fn flag(self) -> i32 {
        match self {
            Self::Read => O_RDONLY,
            Self::Write => O_WRONLY,
            Self::MultipartWrite => O_WRMULTIPART,
        }
    }
}

bitflags! {
    /// What a filesystem implementation can do.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// Files can be written.
        const WRITE          = 1 << 0;
        /// Files can be read.
        const READ           = 1 << 1;
        /// One handle can be read and written at the same time.
        const READ_AND_WRITE = 1 << 2;
        /// Open files support seeking and positional reads.
        const SEEK           = 1 << 3;
        /// Open files can be truncated.
        const TRUNCATE       = 1 << 4;
        /// Open files can be locked.
        const LOCKING        = 1 << 5;
    }
}
