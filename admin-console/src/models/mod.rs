pub mod credential;
pub mod review;

pub use credential::{AdminProfile, AdminRole, Credential, LoginRequest, SessionView, TokenResponse};
pub use review::{
    DecisionRequest, FraudIndicators, Invite, InviteParty, InviteStatus, ReviewAction, ReviewPage,
    ReviewRecord, ReviewStatus, Reviewer,
};
