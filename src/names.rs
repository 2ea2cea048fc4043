//! Module `names` implement the resource-wide name dictionary.
//!
//! Name-bearing nodes carry three small integers, keys into this
//! dictionary, instead of their string names. The dictionary is owned
//! by the resource, snapshotted per revision, and hashed with the
//! city-hash builder so lookups stay cheap for long qualified names.

use std::{
    collections::HashMap,
    hash::{BuildHasher, Hasher},
};

use crate::{
    util::binary::{self, put_bytes, put_u32},
    Result,
};

/// Key returned for absent names.
pub const NULL_NAME_KEY: i32 = -1;

/// Namespaces within the dictionary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum NameSpace {
    Uri = 0,
    Prefix = 1,
    LocalName = 2,
}

/// Type uses google's city hash to convert a name into `u64`.
#[derive(Clone, Copy, Default)]
pub struct CityHasher {
    digest: u128,
}

impl BuildHasher for CityHasher {
    type Hasher = Self;

    #[inline]
    fn build_hasher(&self) -> Self {
        *self
    }
}

impl Hasher for CityHasher {
    fn finish(&self) -> u64 {
        ((self.digest >> 64) as u64) ^ ((self.digest & 0xFFFFFFFFFFFFFFFF) as u64)
    }

    fn write(&mut self, bytes: &[u8]) {
        // accumulate, std hashes a value in more than one write call.
        self.digest = cityhash_rs::cityhash_110_128(bytes) ^ self.digest.rotate_left(1);
    }
}

#[derive(Clone, Default)]
struct Dict {
    map: HashMap<String, i32, CityHasher>,
    rev: Vec<String>,
}

impl Dict {
    fn get_or_insert(&mut self, name: &str) -> i32 {
        match self.map.get(name) {
            Some(key) => *key,
            None => {
                let key = self.rev.len() as i32;
                self.map.insert(name.to_string(), key);
                self.rev.push(name.to_string());
                key
            }
        }
    }

    fn get(&self, name: &str) -> i32 {
        self.map.get(name).copied().unwrap_or(NULL_NAME_KEY)
    }

    fn resolve(&self, key: i32) -> Option<&str> {
        if key < 0 {
            None
        } else {
            self.rev.get(key as usize).map(|s| s.as_str())
        }
    }
}

/// Resource-owned dictionary, one namespace each for URIs, prefixes
/// and local names.
#[derive(Clone, Default)]
pub struct NameDictionary {
    uris: Dict,
    prefixes: Dict,
    locals: Dict,
}

impl NameDictionary {
    pub fn new() -> NameDictionary {
        NameDictionary::default()
    }

    pub fn get_or_insert(&mut self, space: NameSpace, name: &str) -> i32 {
        self.dict_mut(space).get_or_insert(name)
    }

    /// Key for `name`, `NULL_NAME_KEY` when not interned.
    pub fn get(&self, space: NameSpace, name: &str) -> i32 {
        self.dict(space).get(name)
    }

    pub fn resolve(&self, space: NameSpace, key: i32) -> Option<&str> {
        self.dict(space).resolve(key)
    }

    fn dict(&self, space: NameSpace) -> &Dict {
        match space {
            NameSpace::Uri => &self.uris,
            NameSpace::Prefix => &self.prefixes,
            NameSpace::LocalName => &self.locals,
        }
    }

    fn dict_mut(&mut self, space: NameSpace) -> &mut Dict {
        match space {
            NameSpace::Uri => &mut self.uris,
            NameSpace::Prefix => &mut self.prefixes,
            NameSpace::LocalName => &mut self.locals,
        }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        for dict in [&self.uris, &self.prefixes, &self.locals].iter() {
            put_u32(buf, dict.rev.len() as u32);
            for name in dict.rev.iter() {
                put_bytes(buf, name.as_bytes());
            }
        }
    }

    pub fn decode(buf: &mut &[u8]) -> Result<NameDictionary> {
        let mut dicts = vec![];
        for _ in 0..3 {
            let mut dict = Dict::default();
            for _ in 0..binary::take_u32(buf)? {
                let name = err_at!(FailConvert, String::from_utf8(binary::take_bytes(buf)?))?;
                dict.get_or_insert(&name);
            }
            dicts.push(dict);
        }
        let locals = dicts.pop().unwrap();
        let prefixes = dicts.pop().unwrap();
        let uris = dicts.pop().unwrap();
        Ok(NameDictionary {
            uris,
            prefixes,
            locals,
        })
    }
}

#[cfg(test)]
#[path = "names_test.rs"]
mod names_test;
