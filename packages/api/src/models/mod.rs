//! Response shapes. Domain documents come from the `store` crate; the types here
//! hide server-only fields and replace reference ids with small summaries of the
//! referenced documents.

mod user;
mod views;

pub use user::UserInfo;
pub use views::{
    contact_view, contact_views, label_view, label_views, share_view, share_views, ContactSummary,
    ContactView, LabelSummary, LabelView, ShareView,
};
