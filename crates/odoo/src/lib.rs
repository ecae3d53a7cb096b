pub mod crm;
pub mod errors;
pub mod fixtures;
pub mod gateway;
pub mod memory;
pub mod transport;
pub mod xmlrpc;

pub use crm::CrmService;
pub use errors::{CrmError, GatewayError, TransportError};
pub use gateway::{OdooGateway, SearchOptions};
pub use memory::InMemoryTransport;
pub use transport::{Credentials, ObjectCall, OdooTransport, XmlRpcTransport};
