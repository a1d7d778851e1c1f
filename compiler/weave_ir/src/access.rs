//! Access flags for classes, methods and fields.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Access and property flags, using the class-file bit assignments.
    ///
    /// One flag type covers classes, methods and fields; bits that are only
    /// meaningful for one kind of node are ignored on the others.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct AccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        /// `ACC_SUPER` on classes, `ACC_SYNCHRONIZED` on methods.
        const SUPER = 0x0020;
        /// `ACC_BRIDGE` on methods, `ACC_VOLATILE` on fields.
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
    }
}

impl AccessFlags {
    /// Mask of the three visibility bits.
    pub const VISIBILITY: AccessFlags = AccessFlags::PUBLIC
        .union(AccessFlags::PRIVATE)
        .union(AccessFlags::PROTECTED);

    /// Replace the visibility bits with those of `other`.
    #[must_use]
    pub fn with_visibility_of(self, other: AccessFlags) -> AccessFlags {
        (self - Self::VISIBILITY) | (other & Self::VISIBILITY)
    }
}
