//! Hash containers for the small integer and short string keys of the driver.

use std::collections::{HashMap, HashSet};
use std::hash::BuildHasherDefault;

use rustc_hash::FxHasher;

pub type FastHashSet<K> = HashSet<K, BuildHasherDefault<FxHasher>>;
pub type FastHashMap<K, V> = HashMap<K, V, BuildHasherDefault<FxHasher>>;
