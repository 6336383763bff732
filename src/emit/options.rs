//! Emission settings.

/// Message carried by the exception a deleted method throws.
pub const DEFAULT_DELETED_METHOD_MESSAGE: &str = "Attempted to invoke a deleted method implementation. \
This can happen when a method is deleted or its name or signature is changed while the application is running.";

/// Settings of one delta emission.
///
/// # Examples
///
/// ```rust
/// use dotdelta::emit::EmitOptions;
///
/// let options = EmitOptions::default().with_deleted_method_message("removed");
/// assert_eq!(options.deleted_method_message(), "removed");
/// assert!(options.emit_deleted_method_shims());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmitOptions {
    deleted_method_message: String,
    emit_deleted_method_shims: bool,
    validate_enc_map: bool,
    exception_namespace: String,
    exception_name: String,
}

impl Default for EmitOptions {
    fn default() -> Self {
        EmitOptions {
            deleted_method_message: DEFAULT_DELETED_METHOD_MESSAGE.to_string(),
            emit_deleted_method_shims: true,
            validate_enc_map: true,
            exception_namespace: "System".to_string(),
            exception_name: "MissingMethodException".to_string(),
        }
    }
}

impl EmitOptions {
    /// Every check enabled.
    #[must_use]
    pub fn strict() -> Self {
        EmitOptions::default()
    }

    /// Skips re-validation of the finished `EncLog`/`EncMap`.
    #[must_use]
    pub fn lenient() -> Self {
        EmitOptions {
            validate_enc_map: false,
            ..EmitOptions::default()
        }
    }

    /// Sets the message of the exception thrown by deleted methods.
    #[must_use]
    pub fn with_deleted_method_message(mut self, message: &str) -> Self {
        self.deleted_method_message = message.to_string();
        self
    }

    /// Enables or disables throwing bodies for deleted methods.
    #[must_use]
    pub fn with_deleted_method_shims(mut self, enabled: bool) -> Self {
        self.emit_deleted_method_shims = enabled;
        self
    }

    /// Enables or disables re-validation of the finished `EncLog`/`EncMap`.
    #[must_use]
    pub fn with_enc_map_validation(mut self, enabled: bool) -> Self {
        self.validate_enc_map = enabled;
        self
    }

    /// Sets the exception type thrown by deleted methods. It must live in the core
    /// library and have a constructor taking a string.
    #[must_use]
    pub fn with_exception_type(mut self, namespace: &str, name: &str) -> Self {
        self.exception_namespace = namespace.to_string();
        self.exception_name = name.to_string();
        self
    }

    /// Message of the exception thrown by deleted methods.
    #[must_use]
    pub fn deleted_method_message(&self) -> &str {
        &self.deleted_method_message
    }

    /// True if deleted methods get throwing bodies.
    #[must_use]
    pub fn emit_deleted_method_shims(&self) -> bool {
        self.emit_deleted_method_shims
    }

    /// True if the finished `EncLog`/`EncMap` are re-validated.
    #[must_use]
    pub fn validate_enc_map(&self) -> bool {
        self.validate_enc_map
    }

    /// Namespace and name of the exception thrown by deleted methods.
    #[must_use]
    pub fn exception_type(&self) -> (&str, &str) {
        (&self.exception_namespace, &self.exception_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert!(EmitOptions::strict().validate_enc_map());
        assert!(!EmitOptions::lenient().validate_enc_map());
        assert_eq!(
            EmitOptions::default().exception_type(),
            ("System", "MissingMethodException")
        );
    }

    #[test]
    fn test_setters() {
        let options = EmitOptions::default()
            .with_deleted_method_shims(false)
            .with_exception_type("System", "InvalidOperationException");
        assert!(!options.emit_deleted_method_shims());
        assert_eq!(options.exception_type().1, "InvalidOperationException");
    }
}
