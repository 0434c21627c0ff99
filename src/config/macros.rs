/// Define a configuration section with its defaults in one declaration
///
/// ```ignore
/// config_struct! {
///     /// Reader settings
///     pub struct ReaderConfig {
///         retry_attempts: u32 = 3,
///         retry_delay_ms: u64 = 500,
///     }
/// }
/// ```
///
/// Expands to a struct with public fields, a `Default` impl built from the
/// listed values, and serde derives with `#[serde(default)]` so a partial
/// TOML section only overrides what it names.
#[macro_export]
macro_rules! config_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_name:ident: $field_type:ty = $default_value:expr
            ),*
            $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        #[serde(default, deny_unknown_fields)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                pub $field_name: $field_type,
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $(
                        $field_name: $default_value,
                    )*
                }
            }
        }
    };
}
