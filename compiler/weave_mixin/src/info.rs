//! Mixin descriptors.
//!
//! A [`MixinInfo`] is parsed once from a mixin class tree when the mixin is
//! registered, and re-created wholesale when the mixin is reloaded. It is
//! never patched in place.
//!
//! # Declarations
//!
//! The class carries `Lweave/Mixin;` (`targets`, `priority`, `remap`) and
//! any number of `Lweave/Implements;` (`iface`, `prefix`). Each member is
//! classified into exactly one [`MemberHandler`] by its annotation:
//!
//! | annotation | handler |
//! |---|---|
//! | `Lweave/Overwrite;` | [`MemberHandler::Overwrite`] |
//! | `Lweave/Shadow;` | [`MemberHandler::Shadow`] |
//! | `Lweave/Inject;`, `Lweave/Redirect;`, `Lweave/ModifyConstant;` | [`MemberHandler::Injector`] |
//! | `Lweave/Accessor;`, `Lweave/Invoker;` | [`MemberHandler::Accessor`] |
//! | none (method) | [`MemberHandler::Merge`] |
//! | none (field) | [`MemberHandler::Field`] |
//!
//! Initializers of the mixin itself are never merged.

use std::fmt;
use std::sync::Arc;

use weave_inject::InjectorSpec;
use weave_ir::annotation::known;
use weave_ir::{internal_name, ClassNode, ClassSignature, MemberKey, MethodDesc, MethodNode, TypeDesc};
use weave_types::ClassRegistry;

use crate::error::MixinError;
use crate::options::MixinConfig;
use crate::plugin::PluginHandle;

/// An interface a mixin adds to its targets. Mixin methods whose names start
/// with `prefix` are merged with the prefix stripped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceSpec {
    pub iface: String,
    pub prefix: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessorKind {
    Getter,
    Setter,
    Invoker,
}

/// A generated target method exposing a field or calling a method.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessorSpec {
    pub kind: AccessorKind,
    /// The declaring mixin method, which is also the generated method.
    pub method: MemberKey,
    /// The target field (getter/setter) or method (invoker).
    pub target: MemberKey,
    pub is_static: bool,
}

/// How one mixin member is merged into a target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemberHandler {
    /// Replace an existing target method.
    Overwrite(MemberKey),
    /// Add a method, merged under `name`.
    Merge { key: MemberKey, name: String },
    /// Refer to a target member without copying anything.
    Shadow(MemberKey),
    /// Add a field.
    Field(MemberKey),
    SoftImplements(InterfaceSpec),
    Injector(InjectorSpec),
    Accessor(AccessorSpec),
}

impl MemberHandler {
    /// Whether the applicator adds a new method to the target for this
    /// handler. Overwrites replace an existing one.
    pub fn adds_method(&self) -> bool {
        matches!(
            self,
            MemberHandler::Merge { .. } | MemberHandler::Injector(_) | MemberHandler::Accessor(_)
        )
    }
}

/// A parsed mixin.
pub struct MixinInfo {
    class: ClassNode,
    config: Arc<MixinConfig>,
    targets: Vec<String>,
    virtual_targets: Vec<String>,
    priority: i32,
    order: u32,
    remap: bool,
    handlers: Vec<MemberHandler>,
    signature: ClassSignature,
}

impl MixinInfo {
    /// Parse `class` as a mixin of `config`, discovered `order`-th.
    ///
    /// Describes the mixin in `registry` and records its targets there so
    /// hierarchy queries see the widened hierarchy.
    pub fn parse(
        class: ClassNode,
        config: Arc<MixinConfig>,
        order: u32,
        registry: &ClassRegistry,
    ) -> Result<Self, MixinError> {
        let name = class.name.clone();
        let Some(ann) = class.annotation(known::MIXIN) else {
            return Err(MixinError::invalid(&name, "class is not annotated with @Mixin"));
        };

        let mut targets: Vec<String> = Vec::new();
        for target in ann.get_str_list("targets") {
            let target = internal_name(target);
            if target == name {
                return Err(MixinError::invalid(&name, "a mixin cannot target itself"));
            }
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        if targets.is_empty() {
            return Err(MixinError::invalid(&name, "declares no targets"));
        }

        let priority = ann
            .get_int("priority")
            .map(|p| {
                i32::try_from(p)
                    .map_err(|_| MixinError::invalid(&name, format!("priority {p} is out of range")))
            })
            .transpose()?
            .unwrap_or(config.priority);
        let remap = ann.get_bool("remap").unwrap_or(true);

        let virtual_targets: Vec<String> = targets
            .iter()
            .filter(|t| registry.for_name(t).is_none())
            .cloned()
            .collect();

        let interfaces = soft_implements(&class)?;
        let handlers = parse_handlers(&class, &interfaces)?;
        let signature = ClassSignature::of_class(&class);

        registry.describe(&class);
        registry.register_mixin(&name, &targets);
        tracing::debug!(
            mixin = %name,
            targets = ?targets,
            priority,
            handlers = handlers.len(),
            "parsed mixin"
        );

        Ok(MixinInfo {
            class,
            config,
            targets,
            virtual_targets,
            priority,
            order,
            remap,
            handlers,
            signature,
        })
    }

    pub fn name(&self) -> &str {
        &self.class.name
    }

    pub fn class(&self) -> &ClassNode {
        &self.class
    }

    pub fn config(&self) -> &Arc<MixinConfig> {
        &self.config
    }

    pub fn plugin(&self) -> Option<&PluginHandle> {
        self.config.plugin.as_deref()
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn targets_class(&self, name: &str) -> bool {
        self.targets.iter().any(|t| t == name)
    }

    /// Whether `target` could not be resolved when this mixin was parsed.
    pub fn is_virtual_target(&self, target: &str) -> bool {
        self.virtual_targets.iter().any(|t| t == target)
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Discovery order, assigned at registration.
    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn remap(&self) -> bool {
        self.remap
    }

    /// Mixins of a non-required configuration are optional.
    pub fn is_optional(&self) -> bool {
        !self.config.required
    }

    pub fn is_interface(&self) -> bool {
        self.class.is_interface()
    }

    pub fn handlers(&self) -> &[MemberHandler] {
        &self.handlers
    }

    pub fn signature(&self) -> &ClassSignature {
        &self.signature
    }

    /// The mixin's own declaration of `key`.
    pub fn method(&self, key: &MemberKey) -> Option<&MethodNode> {
        self.class.method(&key.name, &key.desc)
    }

    pub fn soft_implements(&self) -> impl Iterator<Item = &InterfaceSpec> {
        self.handlers.iter().filter_map(|h| match h {
            MemberHandler::SoftImplements(spec) => Some(spec),
            _ => None,
        })
    }
}

impl fmt::Debug for MixinInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MixinInfo")
            .field("name", &self.class.name)
            .field("config", &self.config.name)
            .field("targets", &self.targets)
            .field("priority", &self.priority)
            .field("order", &self.order)
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

// ── Parsing ─────────────────────────────────────────────────────────

fn soft_implements(class: &ClassNode) -> Result<Vec<InterfaceSpec>, MixinError> {
    class
        .annotations
        .iter()
        .filter(|a| a.desc == known::IMPLEMENTS)
        .map(|ann| {
            let iface = ann
                .get_str("iface")
                .map(internal_name)
                .ok_or_else(|| MixinError::invalid(&class.name, "@Implements without `iface`"))?;
            let prefix = ann.get_str("prefix").unwrap_or_default();
            if prefix.is_empty() {
                return Err(MixinError::invalid(
                    &class.name,
                    format!("@Implements({iface}) without a prefix"),
                ));
            }
            Ok(InterfaceSpec {
                iface,
                prefix: prefix.to_owned(),
            })
        })
        .collect()
}

fn rename<'a, 'n>(mut interfaces: impl Iterator<Item = &'a InterfaceSpec>, name: &'n str) -> &'n str {
    interfaces
        .find_map(|spec| name.strip_prefix(spec.prefix.as_str()).filter(|n| !n.is_empty()))
        .unwrap_or(name)
}

const METHOD_MARKERS: [&str; 7] = [
    known::OVERWRITE,
    known::SHADOW,
    known::INJECT,
    known::REDIRECT,
    known::MODIFY_CONSTANT,
    known::ACCESSOR,
    known::INVOKER,
];

fn parse_handlers(
    class: &ClassNode,
    interfaces: &[InterfaceSpec],
) -> Result<Vec<MemberHandler>, MixinError> {
    let mixin = class.name.as_str();
    let mut handlers: Vec<MemberHandler> = interfaces
        .iter()
        .cloned()
        .map(MemberHandler::SoftImplements)
        .collect();

    for field in &class.fields {
        handlers.push(if field.annotation(known::SHADOW).is_some() {
            MemberHandler::Shadow(field.key())
        } else {
            MemberHandler::Field(field.key())
        });
    }

    for method in class.methods.iter().filter(|m| !m.is_initializer()) {
        let key = method.key();
        let markers: Vec<&str> = METHOD_MARKERS
            .iter()
            .copied()
            .filter(|desc| method.annotation(desc).is_some())
            .collect();
        if markers.len() > 1 {
            return Err(MixinError::invalid(
                mixin,
                format!("{key} carries conflicting annotations {markers:?}"),
            ));
        }

        let handler = match markers.first().copied() {
            Some(known::OVERWRITE) => {
                if method.is_abstract() {
                    return Err(MixinError::invalid(
                        mixin,
                        format!("@Overwrite method {key} has no body"),
                    ));
                }
                MemberHandler::Overwrite(key)
            }
            Some(known::SHADOW) => MemberHandler::Shadow(key),
            Some(known::ACCESSOR | known::INVOKER) => {
                MemberHandler::Accessor(accessor(mixin, method)?)
            }
            Some(_) => match InjectorSpec::from_method(method) {
                Ok(Some(spec)) => MemberHandler::Injector(spec),
                Ok(None) => {
                    return Err(MixinError::invalid(
                        mixin,
                        format!("{key} has an unreadable injector declaration"),
                    ))
                }
                Err(err) => return Err(MixinError::from_injection(mixin, mixin, err)),
            },
            None => {
                if method.is_abstract() && !class.is_interface() {
                    return Err(MixinError::invalid(
                        mixin,
                        format!("abstract method {key} must be @Shadow, @Accessor or @Invoker"),
                    ));
                }
                let name = rename(interfaces.iter(), &method.name).to_owned();
                MemberHandler::Merge { key, name }
            }
        };
        handlers.push(handler);
    }
    Ok(handlers)
}

const GETTER_PREFIXES: &[&str] = &["get", "is"];
const SETTER_PREFIXES: &[&str] = &["set"];
const INVOKER_PREFIXES: &[&str] = &["call", "invoke"];

fn accessor(mixin: &str, method: &MethodNode) -> Result<AccessorSpec, MixinError> {
    let key = method.key();
    let bad = |reason: String| MixinError::InvalidAccessor {
        mixin: mixin.to_owned(),
        accessor: key.to_string(),
        reason,
    };
    let desc = MethodDesc::parse(&method.desc).map_err(|e| bad(e.to_string()))?;

    if let Some(ann) = method.annotation(known::INVOKER) {
        let name = match ann.get_str("value") {
            Some(name) => name.to_owned(),
            None => strip_accessor_prefix(&method.name, INVOKER_PREFIXES)
                .ok_or_else(|| bad("cannot infer the invoked method name".into()))?,
        };
        return Ok(AccessorSpec {
            kind: AccessorKind::Invoker,
            method: key.clone(),
            target: MemberKey::new(name, method.desc.clone()),
            is_static: method.is_static(),
        });
    }

    let (kind, field_type, prefixes) = match (desc.args.as_slice(), &desc.ret) {
        ([], ret) if *ret != TypeDesc::Void => (AccessorKind::Getter, ret, GETTER_PREFIXES),
        ([arg], TypeDesc::Void) => (AccessorKind::Setter, arg, SETTER_PREFIXES),
        _ => {
            return Err(bad(format!(
                "descriptor {} is neither a getter nor a setter",
                method.desc
            )))
        }
    };
    let name = match method.annotation(known::ACCESSOR).and_then(|a| a.get_str("value")) {
        Some(name) => name.to_owned(),
        None => strip_accessor_prefix(&method.name, prefixes)
            .ok_or_else(|| bad("cannot infer the field name".into()))?,
    };
    Ok(AccessorSpec {
        kind,
        method: key.clone(),
        target: MemberKey::new(name, field_type.descriptor()),
        is_static: method.is_static(),
    })
}

/// `getFooBar` → `fooBar`.
fn strip_accessor_prefix(name: &str, prefixes: &[&str]) -> Option<String> {
    let rest = prefixes.iter().find_map(|p| {
        name.strip_prefix(p)
            .filter(|r| r.chars().next().is_some_and(char::is_uppercase))
    })?;
    let mut chars = rest.chars();
    let first = chars.next()?;
    Some(first.to_lowercase().chain(chars).collect())
}
