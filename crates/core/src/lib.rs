pub mod config;
pub mod domain;
pub mod errors;
pub mod normalize;
pub mod schema;
pub mod value;
pub mod wire;

pub use domain::criteria::{Criterion, Domain, Operator};
pub use domain::filters::{LeadSearchFilters, PartnerSearchFilters};
pub use domain::lead::{Lead, LeadPriority, LeadType};
pub use domain::partner::Partner;
pub use domain::result::{CrmOutcome, OperationResult};
pub use domain::CrmModel;
pub use errors::{ErrorClass, SerializationError, ValidationError};
pub use normalize::normalize;
pub use schema::{MaybeSet, MutationMode};
pub use value::{OdooStruct, OdooValue};
pub use wire::to_wire;
