// Domain-layer modules and shared errors/models
pub mod decision {
    pub use crate::decision::*;
}

pub mod lending {
    pub use crate::lending::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod registry {
    pub use crate::registry::*;
}

pub mod store {
    pub use crate::store::*;
}

pub mod workflow {
    pub use crate::workflow::*;
}

pub mod errors {
    pub use crate::errors::*;
}
