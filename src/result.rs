// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::fmt;

/// Various errors
#[derive(Clone, Copy, Eq, Ord, PartialEq, PartialOrd)]
pub enum Error {
    DevTimeout,
    DevNotPresent,
    DevBus,
    FsNoFs,
    FsBadMagic,
    FsBadVersion,
    FsBadBlockSize,
    FsBlockRange,
    FsChainLoop,
    FsTruncated,
    FsBadEntryType,
    FsBadIndex,
    FsNoFile,
    FsNotDir,
    FsIsDir,
    FsExists,
    FsNotEmpty,
    FsBadPath,
    FsBadName,
    NoSpace,
    NoHandles,
    NoMem,
    BadFd,
    BadMode,
    ExeBadMagic,
    ExeBadVersion,
    ExeTruncated,
    ExeTooBig,
    ExeBlockedOp,
    ProcNoSlots,
    ProcBounds,
    AsmFailed,
    AsmTooBig,
    Utf8,
    NumParse,
    NumRange,
    NoCommand,
    BadArgs,
    Interrupted,
    Reader,
}

impl Error {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DevTimeout => "Device timeout",
            Self::DevNotPresent => "Drive not present",
            Self::DevBus => "Device bus error",
            Self::FsNoFs => "No supported filesystem found",
            Self::FsBadMagic => "EYNFS: bad magic number in superblock",
            Self::FsBadVersion => "EYNFS: unsupported filesystem version",
            Self::FsBadBlockSize => "EYNFS: bad block size in superblock",
            Self::FsBlockRange => "EYNFS: block number out of range",
            Self::FsChainLoop => "EYNFS: block chain walk exhausted",
            Self::FsTruncated => "EYNFS: block chain ends early",
            Self::FsBadEntryType => "EYNFS: invalid directory entry type",
            Self::FsBadIndex => "EYNFS: directory entry index out of range",
            Self::FsNoFile => "No such file or directory",
            Self::FsNotDir => "Not a directory",
            Self::FsIsDir => "Is a directory",
            Self::FsExists => "Name already exists",
            Self::FsNotEmpty => "Directory not empty",
            Self::FsBadPath => "Invalid path",
            Self::FsBadName => "Invalid name",
            Self::NoSpace => "Out of space (no free block)",
            Self::NoHandles => "Out of file handles",
            Self::NoMem => "Out of memory",
            Self::BadFd => "Bad file descriptor",
            Self::BadMode => "Operation not permitted by open mode",
            Self::ExeBadMagic => "EYN: invalid executable magic",
            Self::ExeBadVersion => "EYN: unsupported executable version",
            Self::ExeTruncated => "EYN: executable truncated",
            Self::ExeTooBig => "EYN: code exceeds the load window",
            Self::ExeBlockedOp => "EYN: disallowed instruction in code",
            Self::ProcNoSlots => "No free process slots",
            Self::ProcBounds => "Address outside the process region",
            Self::AsmFailed => "Assembly finished with errors",
            Self::AsmTooBig => "Assembled output exceeds the size cap",
            Self::Utf8 => "UTF-8 conversion error",
            Self::NumParse => "Error parsing number from string",
            Self::NumRange => "Parsed number out of range",
            Self::NoCommand => "Unknown command",
            Self::BadArgs => "Bad command arguments",
            Self::Interrupted => "Interrupted by user",
            Self::Reader => "Reader error",
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> core::result::Result<(), fmt::Error> {
        write!(f, "{}", self.as_str())
    }
}

pub type Result<T> = core::result::Result<T, Error>;
