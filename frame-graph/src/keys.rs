/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Resource key derivation: type keys from a per-type static address, label
//! keys from a tagged string fingerprint.

use dag_scheduler::{ResourceKey, LABEL_KEY_TAG};

/// Same `T` always yields the same key; different `T` always yields a
/// different key; the key is stable for the life of the process.
///
/// A `static` declared inside a generic function is monomorphized once per
/// concrete type parameter, so each instantiation of `type_key::<T>` owns
/// its own byte at its own address — no `TypeId`/reflection required.
pub fn type_key<T: 'static>() -> ResourceKey {
    static TOKEN: u8 = 0;
    ResourceKey(&TOKEN as *const u8 as u64)
}

/// FNV-1a, 32-bit variant — small, dependency-free, and stable across
/// process runs (unlike `RandomState`-seeded hashers), which matters since
/// two passes naming the same label string by literal must always collide.
fn fnv1a_32(s: &str) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    let mut hash = OFFSET_BASIS;
    for byte in s.as_bytes() {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Derive a label's resource key: a 32-bit string fingerprint with the high
/// bit set, so it can never collide with a type key in the same key space.
pub fn label_key(label: &str) -> ResourceKey {
    ResourceKey(LABEL_KEY_TAG | fnv1a_32(label) as u64)
}
