// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod calendar;
pub mod catalog;
pub mod forms;
pub mod ids;
pub mod model;
pub mod onac;
pub mod session;
pub mod state;
pub mod wire;
pub mod wizard;

pub use calendar::*;
pub use catalog::*;
pub use forms::*;
pub use ids::*;
pub use model::*;
pub use onac::*;
pub use session::*;
pub use state::*;
pub use wizard::*;
