// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod error;
pub mod fields;
pub mod forms;
pub mod history;
pub mod ids;
pub mod model;
pub mod state;
pub mod status;
pub mod table;

pub use error::*;
pub use fields::*;
pub use forms::*;
pub use history::*;
pub use ids::*;
pub use model::*;
pub use state::*;
pub use status::*;
pub use table::*;
