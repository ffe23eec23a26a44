// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Serde-specific utilities

use core::fmt;

use serde::{Deserializer, Serializer};

/// Serde "module" for (de)serializing addresses
///
/// Addresses are serialized as integers. They may be deserialized from
/// integers or from strings holding either a `0x` prefixed hex number or a
/// decimal number, e.g. `"0x40000000"`.
pub struct Address;

impl Address {
    pub fn serialize<S>(value: &usize, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(*value as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<usize, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(AddressVisitor)
    }
}

/// [`Visitor`][serde::de::Visitor] for parsing addresses
struct AddressVisitor;

impl serde::de::Visitor<'_> for AddressVisitor {
    type Value = usize;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "an address as integer or string")
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        v.try_into()
            .map_err(|_| E::invalid_value(serde::de::Unexpected::Unsigned(v), &self))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        v.try_into()
            .map_err(|_| E::invalid_value(serde::de::Unexpected::Signed(v), &self))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        let res = if let Some(hex) = v.strip_prefix("0x").or_else(|| v.strip_prefix("0X")) {
            usize::from_str_radix(hex, 16)
        } else {
            v.parse()
        };
        res.map_err(|_| E::invalid_value(serde::de::Unexpected::Str(v), &self))
    }
}
