pub mod advance_payments;
pub mod aggregator;
pub mod blocked_vat;
pub mod boxes;
pub mod net_position;

pub use aggregator::{aggregate_boxes, AggregationInput, AggregationOutput};
pub use boxes::{BoxId, BoxKind, BoxValue, Form201Boxes, Form201Variant};
pub use net_position::{NetVatPosition, TaxPosition};
