// Copyright 2025 ProximaDB
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Metadata filter expressions and their compilation into parameterized SQL.

pub mod compiler;
pub mod filter;
pub mod params;

pub use compiler::{FilterCompiler, FilterResult};
pub use filter::{FieldCondition, MetadataFilter};
pub use params::ParamBuffer;
