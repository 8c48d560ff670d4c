//! The [`Component`] trait and type metadata.
//!
//! Component identity is derived from the component's **string name** using
//! the FNV-1a 64-bit hash, so the same name always yields the same
//! [`ComponentTypeId`] — including across processes, which matters when
//! replication corrections arrive as (type id, payload) pairs.

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

/// A unique identifier for a component type, computed from its string name
/// with the FNV-1a 64-bit hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentTypeId(pub u64);

impl ComponentTypeId {
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Compute the id for a component name.
    ///
    /// Deterministic and language-neutral: any implementation that applies
    /// FNV-1a to the same UTF-8 bytes produces the same id.
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// Compute the id for a Rust component type.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self::from_name(T::type_name())
    }
}

/// Type-erased metadata for a component type.
///
/// The store keeps one `ComponentMeta` per registered type and uses it to
/// size columns, drop values in place, and encode/decode snapshot bytes for
/// the replication boundary.
#[derive(Debug, Clone, Copy)]
pub struct ComponentMeta {
    /// The unique type identifier.
    pub type_id: ComponentTypeId,
    /// Human-readable component name (e.g. `"CurrentHitPoints"`).
    pub name: &'static str,
    /// Memory layout of one component instance.
    pub layout: std::alloc::Layout,
    /// Drops one instance in place, when the type needs dropping.
    pub drop_fn: Option<unsafe fn(*mut u8)>,
    /// Encode one instance (given as raw storage bytes) to MessagePack.
    pub encode_fn: fn(&[u8]) -> Result<Vec<u8>, rmp_serde::encode::Error>,
    /// Decode MessagePack bytes into raw storage bytes for one instance.
    pub decode_fn: fn(&[u8]) -> Result<Vec<u8>, rmp_serde::decode::Error>,
}

/// The contract all simulation data must satisfy.
///
/// Components are plain value types. `Send + Sync` allows parallel system
/// bodies to read them; serde bounds allow the replication layer to snapshot
/// and correct them without knowing the concrete type.
///
/// # Examples
///
/// ```rust
/// use serde::{Serialize, Deserialize};
/// use arena_ecs::Component;
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct CurrentHitPoints(i32);
///
/// impl Component for CurrentHitPoints {
///     fn type_name() -> &'static str { "CurrentHitPoints" }
/// }
/// ```
pub trait Component: Send + Sync + 'static + Serialize + DeserializeOwned {
    /// A stable, human-readable name for this component type.
    fn type_name() -> &'static str;

    /// The [`ComponentTypeId`] for this type.
    fn component_type_id() -> ComponentTypeId {
        ComponentTypeId::from_name(Self::type_name())
    }

    /// The [`ComponentMeta`] descriptor for this type.
    fn meta() -> ComponentMeta {
        ComponentMeta {
            type_id: Self::component_type_id(),
            name: Self::type_name(),
            layout: std::alloc::Layout::new::<Self>(),
            drop_fn: if std::mem::needs_drop::<Self>() {
                Some(|ptr: *mut u8| unsafe {
                    std::ptr::drop_in_place(ptr as *mut Self);
                })
            } else {
                None
            },
            encode_fn: |bytes: &[u8]| {
                assert!(bytes.len() >= std::mem::size_of::<Self>());
                // SAFETY: Caller guarantees `bytes` holds a valid `Self`.
                let value = unsafe { &*(bytes.as_ptr() as *const Self) };
                rmp_serde::to_vec_named(value)
            },
            decode_fn: |bytes: &[u8]| {
                let value: Self = rmp_serde::from_slice(bytes)
                    .map_err(|e| rmp_serde::decode::Error::Syntax(e.to_string()))?;
                let mut raw = vec![0u8; std::mem::size_of::<Self>()];
                // SAFETY: A valid `Self` is written into a correctly-sized buffer.
                unsafe {
                    std::ptr::write(raw.as_mut_ptr() as *mut Self, value);
                }
                Ok(raw)
            },
        }
    }
}

/// A component whose payload is a growable list of elements.
///
/// Buffer components back the many-per-entity data in the combat pipeline
/// (pending damage, already-damaged victims, visual events). The command
/// buffer appends elements through this trait so that parallel writers never
/// touch the store directly.
pub trait BufferComponent: Component {
    /// The element type appended to the buffer.
    type Element: Send + 'static;

    /// Append one element.
    fn push(&mut self, element: Self::Element);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct HitPoints {
        current: i32,
        max: i32,
    }

    impl Component for HitPoints {
        fn type_name() -> &'static str {
            "HitPoints"
        }
    }

    #[test]
    fn test_type_id_matches_from_name() {
        assert_eq!(
            HitPoints::component_type_id(),
            ComponentTypeId::from_name("HitPoints")
        );
    }

    #[test]
    fn test_type_id_differs_between_names() {
        assert_ne!(
            ComponentTypeId::from_name("HitPoints"),
            ComponentTypeId::from_name("AttackDamage")
        );
    }

    #[test]
    fn test_fnv1a_known_vector() {
        // FNV-1a 64-bit of the empty string is the offset basis itself.
        assert_eq!(
            ComponentTypeId::from_name(""),
            ComponentTypeId(0xcbf2_9ce4_8422_2325)
        );
    }

    #[test]
    fn test_meta_layout_and_name() {
        let meta = HitPoints::meta();
        assert_eq!(meta.name, "HitPoints");
        assert_eq!(meta.layout, std::alloc::Layout::new::<HitPoints>());
        assert!(meta.drop_fn.is_none());
    }

    #[test]
    fn test_meta_encode_decode_roundtrip() {
        let value = HitPoints {
            current: 80,
            max: 100,
        };
        let meta = HitPoints::meta();
        let raw = unsafe {
            std::slice::from_raw_parts(
                &value as *const HitPoints as *const u8,
                std::mem::size_of::<HitPoints>(),
            )
        };
        let encoded = (meta.encode_fn)(raw).unwrap();
        let decoded = (meta.decode_fn)(&encoded).unwrap();
        let restored = unsafe { &*(decoded.as_ptr() as *const HitPoints) };
        assert_eq!(*restored, value);
    }

    #[test]
    fn test_drop_fn_present_for_types_needing_drop() {
        #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
        struct DamageLog(Vec<i32>);
        impl Component for DamageLog {
            fn type_name() -> &'static str {
                "DamageLog"
            }
        }
        assert!(DamageLog::meta().drop_fn.is_some());
    }
}
