/// Delivery of out-of-band secrets: password reset links and mobile OTPs.

use uuid::Uuid;

use crate::auth::manager::CredentialManager;
use crate::email_client::{EmailMessage, Mailer};
use crate::error::AppError;
use crate::validators::is_valid_email;

pub const PASSWORD_RESET_SUBJECT: &str = "Your password reset token (valid for 10 min)";
pub const MOBILE_OTP_SUBJECT: &str = "Your verification code (valid for 10 min)";

/// Public URL at which a reset token is redeemed
pub fn reset_url(base_url: &str, token: &str) -> String {
    format!(
        "{}/api/v1/auth/reset-password/{}",
        base_url.trim_end_matches('/'),
        token
    )
}

impl CredentialManager {
    /// Issues a reset token for `email` and mails the reset link.
    ///
    /// Succeeds without sending anything when no account has this email, so
    /// callers cannot learn which emails are registered. If the mail cannot
    /// be sent the freshly issued token is withdrawn and the mail error is
    /// returned.
    pub async fn forgot_password(
        &self,
        mailer: &dyn Mailer,
        base_url: &str,
        email: &str,
    ) -> Result<(), AppError> {
        let email = is_valid_email(email)?;

        let user = match self.store.find_by_email(&email).await? {
            Some(user) => user,
            None => {
                tracing::info!("Password reset requested for unknown email");
                return Ok(());
            }
        };

        let token = self.create_password_reset_token(&user).await?;
        let message = EmailMessage {
            email: user.email.clone(),
            subject: PASSWORD_RESET_SUBJECT.to_string(),
            message: format!(
                "Forgot your password? Submit a PATCH request with your new password to:\n{}\n\n\
                 If you didn't forget your password, please ignore this email.",
                reset_url(base_url, &token)
            ),
        };

        if let Err(e) = mailer.send(&message).await {
            tracing::error!(user_id = %user.id, error = %e, "Reset email failed, withdrawing token");
            self.clear_password_reset_token(user.id).await?;
            return Err(e.into());
        }

        Ok(())
    }

    /// Issues a mobile OTP and mails the code to the account's email.
    pub async fn send_mobile_otp(
        &self,
        mailer: &dyn Mailer,
        user_id: Uuid,
        mobile_number: &str,
    ) -> Result<(), AppError> {
        let user = self.find_user(user_id).await?;
        let otp = self.create_mobile_otp(user.id, mobile_number).await?;

        let message = EmailMessage {
            email: user.email.clone(),
            subject: MOBILE_OTP_SUBJECT.to_string(),
            message: format!(
                "Your verification code is {}.\n\nIt expires in 10 minutes. \
                 If you didn't request it, please ignore this email.",
                otp
            ),
        };

        mailer.send(&message).await?;
        Ok(())
    }
}
