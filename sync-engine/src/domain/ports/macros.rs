//! Declares the error enums of the engine's ports.
//!
//! `RemoteRepositoryError`, `SessionStoreError` and `MirrorStoreError` are
//! all written with `define_port_error!`. Each variant gets a `thiserror`
//! message and a snake-case constructor taking `impl Into` fields, so
//! adapters and test doubles can write `RemoteRepositoryError::not_found("RecordNotFound")`
//! instead of spelling out the struct variant.

macro_rules! define_port_error {
    (@ctor $variant:ident) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]() -> Self {
                Self::$variant
            }
        }
    };

    (@ctor $variant:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        define_port_error!(@ctor_impl $variant () () $( $field : $ty, )*);
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) ) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]($($params)*) -> Self {
                Self::$variant { $($inits)* }
            }
        }
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) $field:ident : $ty:ty, $($rest:tt)*) => {
        define_port_error!(
            @ctor_impl
            $variant
            ($($params)* $field: impl Into<$ty>,)
            ($($inits)* $field: $field.into(),)
            $($rest)*
        );
    };
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),* $(,)? } )? => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( { $($field : $ty),* } )?,
            )*
        }

        impl $name {
            $(
                define_port_error!(@ctor $variant $( { $($field : $ty),* } )?);
            )*
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    use crate::domain::ports::{RemoteRepositoryError, SessionStoreError};

    define_port_error! {
        /// Variant shapes not covered by the engine's own ports.
        pub enum OutboxError {
            Closed => "outbox closed",
            Throttled { message: String, retry_after_secs: u64 } =>
                "throttled: {message} (retry in {retry_after_secs}s)",
        }
    }

    #[test]
    fn unit_variants_get_nullary_constructors() {
        assert_eq!(OutboxError::closed(), OutboxError::Closed);
        assert_eq!(OutboxError::closed().to_string(), "outbox closed");
    }

    #[test]
    fn remote_errors_accept_borrowed_messages() {
        let err = RemoteRepositoryError::not_found("RecordNotFound");
        assert_eq!(
            err,
            RemoteRepositoryError::NotFound {
                message: "RecordNotFound".to_owned()
            }
        );
        assert_eq!(err.to_string(), "remote record not found: RecordNotFound");
    }

    #[test]
    fn session_store_errors_render_their_message() {
        let err = SessionStoreError::query(String::from("deadlock detected"));
        assert_eq!(err.to_string(), "session store query failed: deadlock detected");
    }

    #[test]
    fn mixed_fields_keep_their_types() {
        let err = OutboxError::throttled("slow down", 30_u64);
        assert_eq!(err.to_string(), "throttled: slow down (retry in 30s)");
    }
}
