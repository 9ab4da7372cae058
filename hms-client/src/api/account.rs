//! Account endpoints. Sign-in and sign-out live on [`crate::HmsClient`].

use hms_core::{ApiRequest, ChangePassword, Mutation, UpdateProfile};

pub const REGISTER_PATH: &str = "/auth/register";
pub const PROFILE_PATH: &str = "/auth/me";

pub fn update_password(body: &ChangePassword) -> Mutation {
    Mutation::new(
        "updatePassword",
        ApiRequest::post("/auth/change-password").json(body),
    )
}

pub fn update_profile(body: &UpdateProfile) -> Mutation {
    Mutation::new("updateProfile", ApiRequest::put(PROFILE_PATH).json(body))
}
