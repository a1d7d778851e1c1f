//! Mixin applicators.
//!
//! The applicator is chosen by the target: interface targets get
//! [`Applicator::Interface`], everything else [`Applicator::Standard`]. Both
//! share the merge and injection passes; they differ in what they accept.
//!
//! # Merge markers
//!
//! Every member a mixin contributes is tagged with `Lweave/MixinMerged;`
//! carrying the mixin name and priority. A mixin claiming a member tagged by
//! a different mixin must have strictly higher priority; a tie or a lower
//! priority is a [`MixinError::Conflict`].

use tracing::{debug, warn};
use weave_inject::{HandlerRef, InjectorSpec, InjectorTarget, MergeSite};
use weave_ir::annotation::known;
use weave_ir::builder::load_args;
use weave_ir::{
    AccessFlags, Annotation, ClassNode, FieldNode, FieldOp, Insn, InvokeOp, MemberKey,
    MethodBuilder, MethodDesc, MethodNode, TypeDesc, ValueKind, OBJECT,
};
use weave_types::MemberInfo;

use crate::context::{MergedMember, TargetClassContext};
use crate::error::MixinError;
use crate::info::{AccessorKind, AccessorSpec, InterfaceSpec, MemberHandler, MixinInfo};

/// Annotations that only drive the engine and never reach the target.
const ENGINE_ANNOTATIONS: [&str; 9] = [
    known::OVERWRITE,
    known::SHADOW,
    known::INJECT,
    known::REDIRECT,
    known::MODIFY_CONSTANT,
    known::ACCESSOR,
    known::INVOKER,
    known::MIXIN_MERGED,
    known::DEBUG,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applicator {
    Standard,
    Interface,
}

impl Applicator {
    pub fn for_target(class: &ClassNode) -> Self {
        if class.is_interface() {
            Applicator::Interface
        } else {
            Applicator::Standard
        }
    }

    // ── Validation ──────────────────────────────────────────────────

    /// Check that `mixin` may be applied to the context's target.
    pub(crate) fn validate(
        self,
        ctx: &TargetClassContext,
        mixin: &MixinInfo,
    ) -> Result<(), MixinError> {
        let target = &ctx.class;
        let name = mixin.name();

        if mixin.is_interface() {
            let declares_code = mixin.handlers().iter().any(|h| {
                matches!(
                    h,
                    MemberHandler::Overwrite(_)
                        | MemberHandler::Merge { .. }
                        | MemberHandler::Injector(_)
                )
            });
            if declares_code && !target.is_interface() {
                return Err(MixinError::interface(
                    name,
                    format!(
                        "declares methods but targets class {}; only interfaces may be targeted",
                        target.name
                    ),
                ));
            }
        } else {
            if target.is_interface() {
                return Err(MixinError::invalid(
                    name,
                    format!("class mixin cannot target interface {}", target.name),
                ));
            }
            let mixin_super = mixin.class().super_name.as_deref().unwrap_or(OBJECT);
            if mixin_super != OBJECT {
                let target_super = target.super_name.as_deref().unwrap_or(OBJECT);
                if !ctx.registry.is_assignable(target_super, mixin_super) {
                    return Err(MixinError::invalid(
                        name,
                        format!(
                            "superclass {mixin_super} is not a supertype of {}",
                            target.name
                        ),
                    ));
                }
            }
        }

        if self == Applicator::Interface {
            for handler in mixin.handlers() {
                let illegal = match handler {
                    MemberHandler::Injector(spec) => Some(format!(
                        "injector {} cannot be applied to an interface",
                        spec.handler_name
                    )),
                    MemberHandler::Accessor(spec) => Some(format!(
                        "accessor {} cannot be applied to an interface",
                        spec.method
                    )),
                    MemberHandler::Field(key) => mixin
                        .class()
                        .field(&key.name, &key.desc)
                        .filter(|f| !f.is_static())
                        .map(|_| format!("interface fields must be static, {key} is not")),
                    _ => None,
                };
                if let Some(reason) = illegal {
                    return Err(MixinError::interface(name, reason));
                }
            }
        }
        Ok(())
    }

    // ── Merge pass ──────────────────────────────────────────────────

    /// Merge every member of `mixin` into the tree.
    pub(crate) fn merge(
        self,
        ctx: &mut TargetClassContext,
        mixin: &MixinInfo,
    ) -> Result<(), MixinError> {
        register_pending(ctx, mixin);

        for handler in mixin.handlers() {
            match handler {
                MemberHandler::Overwrite(key) => {
                    let method = prepare_method(ctx, mixin, key)?;
                    overwrite(ctx, mixin, method, true)?;
                }
                MemberHandler::Merge { key, name } => {
                    let mut method = prepare_method(ctx, mixin, key)?;
                    method.name.clone_from(name);
                    if ctx.class.method(name, &key.desc).is_some() {
                        debug!(
                            target = %ctx.class.name,
                            mixin = %mixin.name(),
                            method = %method.key(),
                            "merged method replaces an existing one"
                        );
                        overwrite(ctx, mixin, method, false)?;
                    } else {
                        add_method(ctx, method);
                    }
                }
                MemberHandler::Shadow(key) => shadow(ctx, mixin, key)?,
                MemberHandler::Field(key) => merge_field(ctx, mixin, key)?,
                MemberHandler::SoftImplements(spec) => soft_implement(ctx, spec),
                MemberHandler::Injector(spec) => {
                    let mut method = prepare_method(ctx, mixin, &handler_key(spec))?;
                    method.name = handler_name(ctx, mixin, spec)?;
                    method.access = method.access.difference(AccessFlags::VISIBILITY)
                        | AccessFlags::PRIVATE
                        | AccessFlags::SYNTHETIC;
                    add_method(ctx, method);
                }
                // Generated during the injection pass
                MemberHandler::Accessor(_) => {}
            }
        }

        for iface in &mixin.class().interfaces {
            ctx.class.add_interface(iface);
        }
        if mixin.is_interface() {
            ctx.class.add_interface(mixin.name());
            ctx.signature.add_interface(mixin.name());
        }
        ctx.signature.merge(mixin.signature());
        if mixin.class().signature.is_some() {
            ctx.generic = true;
        }
        debug!(target = %ctx.class.name, mixin = %mixin.name(), "merged mixin");
        Ok(())
    }

    // ── Injection pass ──────────────────────────────────────────────

    /// Generate accessors and run the injectors of `mixin`.
    pub(crate) fn inject(
        self,
        ctx: &mut TargetClassContext,
        mixin: &MixinInfo,
    ) -> Result<(), MixinError> {
        for handler in mixin.handlers() {
            if let MemberHandler::Accessor(spec) = handler {
                generate_accessor(ctx, mixin, spec)?;
            }
        }
        for handler in mixin.handlers() {
            if let MemberHandler::Injector(spec) = handler {
                run_injector(ctx, mixin, spec)?;
            }
        }
        Ok(())
    }
}

// ── Pending methods ─────────────────────────────────────────────────

fn register_pending(ctx: &mut TargetClassContext, mixin: &MixinInfo) {
    for handler in mixin.handlers() {
        let key = match handler {
            MemberHandler::Merge { key, name } => MemberKey::new(name.as_str(), key.desc.as_str()),
            MemberHandler::Injector(spec) => {
                let unique = format!(
                    "{}${}${}",
                    spec.kind.handler_prefix(),
                    ctx.handler_counter,
                    spec.handler_name
                );
                ctx.handler_counter += 1;
                let key = MemberKey::new(unique.as_str(), spec.handler_desc.descriptor());
                ctx.handler_names
                    .insert((mixin.name().to_owned(), handler_key(spec)), unique);
                key
            }
            MemberHandler::Accessor(spec) => spec.method.clone(),
            _ => continue,
        };
        ctx.pending.insert(key);
    }
}

fn handler_key(spec: &InjectorSpec) -> MemberKey {
    MemberKey::new(spec.handler_name.as_str(), spec.handler_desc.descriptor())
}

fn handler_name(
    ctx: &TargetClassContext,
    mixin: &MixinInfo,
    spec: &InjectorSpec,
) -> Result<String, MixinError> {
    ctx.handler_names
        .get(&(mixin.name().to_owned(), handler_key(spec)))
        .cloned()
        .ok_or_else(|| {
            MixinError::invalid(
                mixin.name(),
                format!("handler {} was never registered", spec.handler_name),
            )
        })
}

// ── Members ─────────────────────────────────────────────────────────

fn marker(mixin: &MixinInfo) -> Annotation {
    Annotation::new(known::MIXIN_MERGED)
        .with("mixin", mixin.name())
        .with("priority", mixin.priority())
}

/// Enforce the merge-marker conflict rules for a member tagged `existing`.
fn claim(
    ctx: &TargetClassContext,
    mixin: &MixinInfo,
    member: &MemberKey,
    existing: Option<&Annotation>,
) -> Result<(), MixinError> {
    let Some(existing) = existing else {
        return Ok(());
    };
    let owner = existing.get_str("mixin").unwrap_or_default();
    if owner == mixin.name() {
        return Ok(());
    }
    let existing_priority = existing
        .get_int("priority")
        .and_then(|p| i32::try_from(p).ok())
        .unwrap_or(ctx.default_priority);
    if mixin.priority() > existing_priority {
        debug!(
            target = %ctx.class.name,
            member = %member,
            previous = owner,
            mixin = %mixin.name(),
            "higher priority mixin takes over member"
        );
        return Ok(());
    }
    Err(MixinError::Conflict {
        target: ctx.class.name.clone(),
        member: member.to_string(),
        existing: owner.to_owned(),
        existing_priority,
        incoming: mixin.name().to_owned(),
        incoming_priority: mixin.priority(),
    })
}

/// Copy mixin method `key`, retargeted at the context's class and tagged with
/// the merge marker.
fn prepare_method(
    ctx: &TargetClassContext,
    mixin: &MixinInfo,
    key: &MemberKey,
) -> Result<MethodNode, MixinError> {
    let source = mixin
        .method(key)
        .ok_or_else(|| MixinError::invalid(mixin.name(), format!("{key} is not declared")))?;
    let mut method = source.clone();
    method
        .annotations
        .retain(|a| !ENGINE_ANNOTATIONS.contains(&a.desc.as_str()));
    method.put_annotation(marker(mixin));
    retarget(&mut method, mixin, &ctx.class.name);
    Ok(method)
}

/// Point self-references of the mixin at `target`.
fn retarget(method: &mut MethodNode, mixin: &MixinInfo, target: &str) {
    let interfaces: Vec<&InterfaceSpec> = mixin.soft_implements().collect();
    let rename = |name: &str| -> String {
        interfaces
            .iter()
            .find_map(|spec| name.strip_prefix(spec.prefix.as_str()).filter(|n| !n.is_empty()))
            .unwrap_or(name)
            .to_owned()
    };
    let insns: Vec<Insn> = method
        .insns
        .iter()
        .map(|insn| match insn {
            Insn::Invoke {
                op,
                owner,
                name,
                desc,
            } if owner == mixin.name() => Insn::Invoke {
                op: *op,
                owner: target.to_owned(),
                name: rename(name),
                desc: desc.clone(),
            },
            Insn::Field {
                op,
                owner,
                name,
                desc,
            } if owner == mixin.name() => Insn::Field {
                op: *op,
                owner: target.to_owned(),
                name: name.clone(),
                desc: desc.clone(),
            },
            other => other.clone(),
        })
        .collect();
    method.insns.set(insns);
}

fn add_method(ctx: &mut TargetClassContext, method: MethodNode) {
    let key = method.key();
    ctx.merged
        .push(MergedMember::Method(MemberInfo::new(key.clone(), method.access)));
    ctx.pending.remove(&key);
    ctx.class.methods.push(method);
}

/// Replace the body of an existing target method with `method`.
fn overwrite(
    ctx: &mut TargetClassContext,
    mixin: &MixinInfo,
    method: MethodNode,
    explicit: bool,
) -> Result<(), MixinError> {
    let key = method.key();
    let Some(index) = ctx.class.method_index(&key) else {
        return Err(MixinError::invalid(
            mixin.name(),
            format!("@Overwrite target {key} not found in {}", ctx.class.name),
        ));
    };
    let existing = &ctx.class.methods[index];
    if existing.is_static() != method.is_static() {
        return Err(MixinError::invalid(
            mixin.name(),
            format!("{key} changes static-ness of the target method"),
        ));
    }
    if !explicit && existing.annotation(known::MIXIN_MERGED).is_none() {
        warn!(
            target = %ctx.class.name,
            mixin = %mixin.name(),
            method = %key,
            "method without @Overwrite replaces a target method"
        );
    }
    claim(ctx, mixin, &key, existing.annotation(known::MIXIN_MERGED))?;

    let target = &mut ctx.class.methods[index];
    target.access = method.access;
    target.signature = method.signature;
    target.insns = method.insns;
    target.max_locals = method.max_locals;
    target.max_stack = method.max_stack;
    target.put_annotation(marker(mixin));
    ctx.merged
        .push(MergedMember::Method(MemberInfo::new(key.clone(), target.access)));
    ctx.pending.remove(&key);
    Ok(())
}

fn shadow(ctx: &TargetClassContext, mixin: &MixinInfo, key: &MemberKey) -> Result<(), MixinError> {
    let target = &ctx.class.name;
    let found = if key.is_method() {
        ctx.class.method(&key.name, &key.desc).is_some()
            || ctx.pending.contains(key)
            || ctx
                .registry
                .find_method_in_hierarchy(target, &key.name, &key.desc)
                .is_some()
    } else {
        ctx.class.field(&key.name, &key.desc).is_some()
            || ctx
                .registry
                .find_field_in_hierarchy(target, &key.name, &key.desc)
                .is_some()
    };
    if found {
        Ok(())
    } else {
        Err(MixinError::invalid(
            mixin.name(),
            format!("@Shadow member {key} not found in {target}"),
        ))
    }
}

fn merge_field(
    ctx: &mut TargetClassContext,
    mixin: &MixinInfo,
    key: &MemberKey,
) -> Result<(), MixinError> {
    let source = mixin
        .class()
        .field(&key.name, &key.desc)
        .ok_or_else(|| MixinError::invalid(mixin.name(), format!("{key} is not declared")))?;
    let mut field: FieldNode = source.clone();
    field
        .annotations
        .retain(|a| !ENGINE_ANNOTATIONS.contains(&a.desc.as_str()));
    field.annotations.push(marker(mixin));

    match ctx.class.fields.iter().position(|f| f.key() == *key) {
        Some(index) => {
            let existing = ctx.class.fields[index].annotation(known::MIXIN_MERGED);
            if existing.is_none() {
                return Err(MixinError::invalid(
                    mixin.name(),
                    format!("field {key} already exists in {}", ctx.class.name),
                ));
            }
            claim(ctx, mixin, key, existing)?;
            ctx.class.fields[index] = field;
        }
        None => ctx.class.fields.push(field),
    }
    ctx.merged
        .push(MergedMember::Field(MemberInfo::new(key.clone(), source.access)));
    Ok(())
}

fn soft_implement(ctx: &mut TargetClassContext, spec: &InterfaceSpec) {
    ctx.class.add_interface(&spec.iface);
    ctx.signature.add_interface(&spec.iface);
}

// ── Accessors ───────────────────────────────────────────────────────

fn generate_accessor(
    ctx: &mut TargetClassContext,
    mixin: &MixinInfo,
    spec: &AccessorSpec,
) -> Result<(), MixinError> {
    let target = ctx.class.name.clone();
    let bad = |reason: String| MixinError::InvalidAccessor {
        mixin: mixin.name().to_owned(),
        accessor: spec.method.to_string(),
        reason,
    };
    let desc = MethodDesc::parse(&spec.method.desc).map_err(|e| bad(e.to_string()))?;
    let receiver = u16::from(!spec.is_static);

    let mut body = Vec::new();
    match spec.kind {
        AccessorKind::Getter | AccessorKind::Setter => {
            let (owner, is_static) = find_field(ctx, &spec.target)
                .ok_or_else(|| bad(format!("field {} not found in {target}", spec.target)))?;
            if is_static != spec.is_static {
                return Err(bad(format!(
                    "static-ness does not match field {}",
                    spec.target
                )));
            }
            let field_kind = TypeDesc::parse(&spec.target.desc)
                .map_err(|e| bad(e.to_string()))?
                .kind();
            if !spec.is_static {
                body.push(Insn::load(ValueKind::Ref, 0));
            }
            let op = match (spec.kind, spec.is_static) {
                (AccessorKind::Getter, true) => FieldOp::GetStatic,
                (AccessorKind::Getter, false) => FieldOp::GetField,
                (_, true) => FieldOp::PutStatic,
                (_, false) => FieldOp::PutField,
            };
            if spec.kind == AccessorKind::Setter {
                body.push(Insn::load(field_kind, receiver));
            }
            body.push(Insn::field(op, &owner, &spec.target.name, &spec.target.desc));
        }
        AccessorKind::Invoker => {
            let (owner, callee) = find_method(ctx, &spec.target)
                .ok_or_else(|| bad(format!("method {} not found in {target}", spec.target)))?;
            if callee.is_static() != spec.is_static {
                return Err(bad(format!(
                    "static-ness does not match method {}",
                    spec.target
                )));
            }
            if !spec.is_static {
                body.push(Insn::load(ValueKind::Ref, 0));
            }
            body.extend(load_args(&desc, receiver));
            let op = if spec.is_static {
                InvokeOp::Static
            } else if callee.access.contains(AccessFlags::PRIVATE) {
                InvokeOp::Special
            } else {
                InvokeOp::Virtual
            };
            body.push(Insn::invoke(op, &owner, &spec.target.name, &spec.target.desc));
        }
    }

    let source = mixin
        .method(&spec.method)
        .ok_or_else(|| bad("accessor is not declared".into()))?;
    let access = source.access.difference(AccessFlags::ABSTRACT) | AccessFlags::SYNTHETIC;
    let mut method = MethodBuilder::new(access, &spec.method.name, &spec.method.desc)
        .insns(body)
        .ret()
        .build();
    method.put_annotation(marker(mixin));

    if ctx.class.method_index(&spec.method).is_some() {
        overwrite(ctx, mixin, method, false)
    } else {
        debug!(target = %target, mixin = %mixin.name(), accessor = %spec.method, "generated accessor");
        add_method(ctx, method);
        Ok(())
    }
}

/// Owner and static-ness of field `key` on the target or its hierarchy.
fn find_field(ctx: &TargetClassContext, key: &MemberKey) -> Option<(String, bool)> {
    if let Some(field) = ctx.class.field(&key.name, &key.desc) {
        return Some((ctx.class.name.clone(), field.is_static()));
    }
    ctx.registry
        .find_field_in_hierarchy(&ctx.class.name, &key.name, &key.desc)
        .map(|(owner, info)| (owner, info.is_static()))
}

fn find_method(ctx: &TargetClassContext, key: &MemberKey) -> Option<(String, MemberInfo)> {
    if let Some(method) = ctx.class.method(&key.name, &key.desc) {
        return Some((
            ctx.class.name.clone(),
            MemberInfo::new(method.key(), method.access),
        ));
    }
    ctx.registry
        .find_method_in_hierarchy(&ctx.class.name, &key.name, &key.desc)
}

// ── Injectors ───────────────────────────────────────────────────────

fn run_injector(
    ctx: &mut TargetClassContext,
    mixin: &MixinInfo,
    spec: &InjectorSpec,
) -> Result<(), MixinError> {
    let unique = handler_name(ctx, mixin, spec)?;
    let handler = HandlerRef {
        owner: ctx.class.name.clone(),
        name: unique.clone(),
        desc: spec.handler_desc.descriptor(),
        is_static: spec.is_static,
    };
    let site = MergeSite {
        mixin: mixin.name(),
        priority: mixin.priority(),
    };
    let handlers: Vec<&String> = ctx.handler_names.values().collect();
    let keys: Vec<MemberKey> = ctx
        .class
        .methods
        .iter()
        .filter(|m| spec.targets(m) && !handlers.contains(&&m.name))
        .map(MethodNode::key)
        .collect();

    let mut total = 0u32;
    for key in keys {
        let target = ctx.target_for(&key)?;
        let class_name = ctx.class.name.clone();
        let index = ctx
            .class
            .method_index(&key)
            .ok_or_else(|| MixinError::UnknownTargetMethod {
                target: class_name.clone(),
                member: key.to_string(),
            })?;
        let method = &mut ctx.class.methods[index];
        let mut itarget = InjectorTarget::new(target, method, &spec.slices, ctx.default_priority);
        let result = spec.inject(&mut itarget, method, &handler, site);
        itarget.dispose();
        total += result.map_err(|e| MixinError::from_injection(mixin.name(), &class_name, e))?;
    }

    spec.check_require(total)
        .map_err(|e| MixinError::from_injection(mixin.name(), &ctx.class.name, e))?;
    if total == 0 {
        warn!(
            target = %ctx.class.name,
            mixin = %mixin.name(),
            handler = %spec.handler_name,
            "injector matched nothing"
        );
    }
    Ok(())
}
