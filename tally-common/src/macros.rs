/// Implements `Serialize` and `Deserialize` through the `Display` and `FromStr` impls of a type.
///
/// The second argument describes the expected input in deserialization errors.
///
/// ```
/// use std::fmt;
/// use std::str::FromStr;
///
/// #[derive(Debug, PartialEq)]
/// struct Flag(bool);
///
/// impl fmt::Display for Flag {
///     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
///         f.write_str(if self.0 { "on" } else { "off" })
///     }
/// }
///
/// impl FromStr for Flag {
///     type Err = ();
///
///     fn from_str(s: &str) -> Result<Self, ()> {
///         match s {
///             "on" => Ok(Flag(true)),
///             "off" => Ok(Flag(false)),
///             _ => Err(()),
///         }
///     }
/// }
///
/// tally_common::impl_str_serde!(Flag, "either on or off");
/// ```
#[macro_export]
macro_rules! impl_str_serde {
    ($type:ty, $expectation:expr) => {
        impl ::serde::Serialize for $type {
            fn serialize<S>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error>
            where
                S: ::serde::Serializer,
            {
                serializer.collect_str(self)
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $type {
            fn deserialize<D>(deserializer: D) -> ::std::result::Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                let value =
                    <::std::borrow::Cow<'de, str> as ::serde::Deserialize<'de>>::deserialize(
                        deserializer,
                    )?;
                value.parse().map_err(|_| {
                    <D::Error as ::serde::de::Error>::invalid_value(
                        ::serde::de::Unexpected::Str(&*value),
                        &$expectation,
                    )
                })
            }
        }
    };
}
