//! Built-in actor implementations.

pub mod constants;
pub mod display;
pub mod null;
pub mod storage;
pub mod variable;

pub use constants::StringConstants;
pub use display::Display;
pub use null::Null;
pub use storage::{Publish, SetStorageValue};
pub use variable::SetVariable;

use super::indirection::{kind_name, Indirection, ReferenceKind, Role};
use super::registry::ActorCatalog;

/// Register every built-in kind with a catalog
pub fn register_builtins(catalog: &ActorCatalog) {
    catalog.register_default::<StringConstants>(StringConstants::KIND);
    catalog.register_default::<Null>(Null::KIND);
    catalog.register_default::<SetStorageValue>(SetStorageValue::KIND);
    catalog.register_default::<Publish>(Publish::KIND);
    catalog.register_default::<SetVariable>(SetVariable::KIND);
    catalog.register_default::<Display>(Display::KIND);

    for kind in [
        ReferenceKind::Callable,
        ReferenceKind::NamedSetup,
        ReferenceKind::External,
    ] {
        for role in [Role::Source, Role::Transformer, Role::Sink] {
            catalog.register(kind_name(kind, role), move || {
                Box::new(Indirection::new(kind, role))
            });
        }
    }
}
