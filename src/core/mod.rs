// Copyright 2025 ProximaDB
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

pub mod config;
pub mod embedding;
pub mod error;
pub mod types;

pub use config::*;
pub use embedding::{probe_dimension, Embedder};
pub use error::*;
pub use types::*;
