// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod gateway;
pub mod ids;
pub mod import;
pub mod model;
pub mod selection;
pub mod session;
pub mod state;
pub mod validation;
pub mod view;

pub use gateway::*;
pub use ids::*;
pub use import::*;
pub use model::*;
pub use selection::*;
pub use session::*;
pub use state::*;
pub use view::*;
