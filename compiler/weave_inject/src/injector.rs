//! Injector declarations and code generation.
//!
//! Three injector kinds rewrite target methods:
//!
//! - **Callback** (`Lweave/Inject;`) inserts a call to the handler before
//!   each matched instruction. `HEAD` lands before the first executable
//!   instruction.
//! - **Redirect** (`Lweave/Redirect;`) replaces a matched call or field
//!   access with a call to the handler. The handler takes the redirected
//!   operation's operands (receiver first) and produces its result.
//! - **ModifyConstant** (`Lweave/ModifyConstant;`) passes a matched constant
//!   through the handler.
//!
//! # Algorithm
//!
//! 1. Resolve every locator against its slice view, collecting absolute
//!    positions (sorted, deduplicated).
//! 2. Rewrite positions from last to first so earlier indices stay valid.
//! 3. Instance handlers need the receiver beneath their operands. Operands
//!    already on the stack are spilled into freshly allocated locals, the
//!    receiver is loaded, and the operands are reloaded on top of it.

use std::fmt;

use smallvec::SmallVec;
use tracing::debug;
use weave_ir::annotation::known;
use weave_ir::builder::load_args;
use weave_ir::{
    Annotation, FieldOp, Insn, InvokeOp, MethodDesc, MethodNode, TypeDesc, ValueKind, CTOR,
};

use crate::error::InjectionError;
use crate::injector_target::InjectorTarget;
use crate::point::{InjectionPoint, Positions, Selector};
use crate::slice::{MethodSlice, Slices};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InjectorKind {
    Callback,
    Redirect,
    ModifyConstant,
}

impl InjectorKind {
    const ALL: [InjectorKind; 3] = [
        InjectorKind::Callback,
        InjectorKind::Redirect,
        InjectorKind::ModifyConstant,
    ];

    /// The declaring annotation's descriptor.
    pub fn annotation_desc(self) -> &'static str {
        match self {
            InjectorKind::Callback => known::INJECT,
            InjectorKind::Redirect => known::REDIRECT,
            InjectorKind::ModifyConstant => known::MODIFY_CONSTANT,
        }
    }

    /// Prefix of the unique name a handler is merged under.
    pub fn handler_prefix(self) -> &'static str {
        match self {
            InjectorKind::Callback => "handler",
            InjectorKind::Redirect => "redirect",
            InjectorKind::ModifyConstant => "constant",
        }
    }

    /// Whether this kind replaces or wraps existing instructions, rather than
    /// only adding calls.
    pub fn rewrites(self) -> bool {
        !matches!(self, InjectorKind::Callback)
    }
}

// ── Target method selectors ─────────────────────────────────────────

/// Selects target methods by name and optional descriptor: `foo` or
/// `foo(I)V`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TargetSelector {
    pub name: String,
    pub desc: Option<String>,
}

impl TargetSelector {
    pub fn parse(text: &str) -> Result<Self, InjectionError> {
        let (name, desc) = match text.find('(') {
            Some(i) => (&text[..i], Some(&text[i..])),
            None => (text, None),
        };
        if name.is_empty() {
            return Err(InjectionError::invalid(format!(
                "malformed target method `{text}`"
            )));
        }
        if let Some(d) = desc {
            MethodDesc::parse(d).map_err(|e| InjectionError::invalid(e.to_string()))?;
        }
        Ok(TargetSelector {
            name: name.to_owned(),
            desc: desc.map(str::to_owned),
        })
    }

    pub fn matches(&self, method: &MethodNode) -> bool {
        self.name == method.name && self.desc.as_deref().map_or(true, |d| d == method.desc)
    }
}

impl fmt::Display for TargetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.desc.as_deref().unwrap_or(""))
    }
}

// ── Handlers ────────────────────────────────────────────────────────

/// The merged handler method an injector calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerRef {
    /// The target class the handler was merged into.
    pub owner: String,
    /// The unique merged name.
    pub name: String,
    pub desc: String,
    pub is_static: bool,
}

impl HandlerRef {
    fn call(&self) -> Insn {
        let op = if self.is_static {
            InvokeOp::Static
        } else {
            InvokeOp::Special
        };
        Insn::invoke(op, &self.owner, &self.name, &self.desc)
    }
}

/// The mixin applying an injector, for conflict checks.
#[derive(Clone, Copy, Debug)]
pub struct MergeSite<'s> {
    pub mixin: &'s str,
    pub priority: i32,
}

// ── Injector declarations ───────────────────────────────────────────

/// A parsed injector handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InjectorSpec {
    pub kind: InjectorKind,
    /// Handler name as declared in the mixin.
    pub handler_name: String,
    pub handler_desc: MethodDesc,
    pub is_static: bool,
    pub methods: Vec<TargetSelector>,
    pub points: Vec<InjectionPoint>,
    pub slices: Slices,
    /// Minimum number of injections across all target methods.
    pub require: Option<u32>,
}

impl InjectorSpec {
    /// Parse the injector declared on `method`, if any.
    pub fn from_method(method: &MethodNode) -> Result<Option<Self>, InjectionError> {
        let Some((kind, ann)) = InjectorKind::ALL
            .iter()
            .find_map(|k| method.annotation(k.annotation_desc()).map(|a| (*k, a)))
        else {
            return Ok(None);
        };
        Self::from_annotation(kind, method, ann).map(Some)
    }

    fn from_annotation(
        kind: InjectorKind,
        method: &MethodNode,
        ann: &Annotation,
    ) -> Result<Self, InjectionError> {
        let handler = method.key();
        let handler_desc = MethodDesc::parse(&method.desc)
            .map_err(|e| InjectionError::invalid(format!("handler {handler}: {e}")))?;

        let methods = ann
            .get_str_list("method")
            .into_iter()
            .map(TargetSelector::parse)
            .collect::<Result<Vec<_>, _>>()?;
        if methods.is_empty() {
            return Err(InjectionError::invalid(format!(
                "handler {handler} declares no target method"
            )));
        }

        let points = ann
            .get_annotations("at")
            .into_iter()
            .map(InjectionPoint::from_annotation)
            .collect::<Result<Vec<_>, _>>()?;
        if points.is_empty() {
            return Err(InjectionError::invalid(format!(
                "handler {handler} declares no injection point"
            )));
        }
        for point in &points {
            let legal = match kind {
                InjectorKind::Callback => true,
                InjectorKind::Redirect => {
                    matches!(point.selector, Selector::Invoke | Selector::Field)
                }
                InjectorKind::ModifyConstant => point.selector == Selector::Constant,
            };
            if !legal {
                return Err(InjectionError::invalid(format!(
                    "{point} is not a legal injection point for {kind:?} handler {handler}"
                )));
            }
        }

        let slices = Slices::new(
            ann.get_annotations("slice")
                .into_iter()
                .map(MethodSlice::from_annotation)
                .collect::<Result<Vec<_>, _>>()?,
        )?;
        let require = ann
            .get_int("require")
            .and_then(|r| u32::try_from(r).ok())
            .filter(|r| *r > 0);

        Ok(InjectorSpec {
            kind,
            handler_name: method.name.clone(),
            handler_desc,
            is_static: method.is_static(),
            methods,
            points,
            slices,
            require,
        })
    }

    /// Whether this injector targets `method`.
    pub fn targets(&self, method: &MethodNode) -> bool {
        self.methods.iter().any(|s| s.matches(method))
    }

    /// Check the handler signature against the target method.
    ///
    /// Redirect and constant handlers are additionally checked per matched
    /// instruction during [`inject`](Self::inject).
    pub fn validate_handler(&self, itarget: &InjectorTarget<'_>) -> Result<(), InjectionError> {
        let target = itarget.target();
        if self.is_static != target.is_static() {
            return Err(InjectionError::invalid(format!(
                "handler {} must {}be static to inject into {}",
                self.handler_name,
                if target.is_static() { "" } else { "not " },
                target.key()
            )));
        }
        if self.kind == InjectorKind::Callback {
            if self.handler_desc.ret != TypeDesc::Void {
                return Err(InjectionError::invalid(format!(
                    "callback handler {} must return void",
                    self.handler_name
                )));
            }
            if !self.handler_desc.args.is_empty() && self.handler_desc.args != target.args() {
                return Err(InjectionError::invalid(format!(
                    "callback handler {}{} must take no arguments or exactly the arguments of {}",
                    self.handler_name,
                    self.handler_desc,
                    target.key()
                )));
            }
        }
        Ok(())
    }

    /// Fail if `count` injections fall short of `require`.
    pub fn check_require(&self, count: u32) -> Result<(), InjectionError> {
        match self.require {
            Some(required) if count < required => Err(InjectionError::invalid(format!(
                "handler {} required {required} injection(s) but applied {count}",
                self.handler_name
            ))),
            _ => Ok(()),
        }
    }

    /// Resolve every locator and collect absolute positions.
    fn positions(
        &self,
        itarget: &mut InjectorTarget<'_>,
        method: &MethodNode,
    ) -> Result<Positions, InjectionError> {
        let mut all: Positions = SmallVec::new();
        for point in &self.points {
            let view = itarget.get_slice(method, point.slice.as_deref().unwrap_or(""))?;
            all.extend(point.find(view.insns(&method.insns), view.start()));
        }
        all.sort_unstable();
        all.dedup();
        Ok(all)
    }

    /// Apply this injector to `method`. Returns the number of injections.
    pub fn inject(
        &self,
        itarget: &mut InjectorTarget<'_>,
        method: &mut MethodNode,
        handler: &HandlerRef,
        site: MergeSite<'_>,
    ) -> Result<u32, InjectionError> {
        self.validate_handler(itarget)?;

        if let Some(owner) = itarget.merged_by().filter(|owner| *owner != site.mixin) {
            if self.kind.rewrites() && itarget.merged_priority() > site.priority {
                return Err(InjectionError::Conflict {
                    method: format!("{}::{}", itarget.target().class_name(), method.key()),
                    merged_by: owner.to_owned(),
                    merged_priority: itarget.merged_priority(),
                    mixin: site.mixin.to_owned(),
                    priority: site.priority,
                });
            }
            debug!(
                method = %method.key(),
                merged_by = owner,
                mixin = site.mixin,
                "injecting into a method merged by another mixin"
            );
        }

        let positions = self.positions(itarget, method)?;
        for &pos in positions.iter().rev() {
            match self.kind {
                InjectorKind::Callback => self.emit_callback(itarget, method, handler, pos),
                InjectorKind::Redirect => self.emit_redirect(itarget, method, handler, pos)?,
                InjectorKind::ModifyConstant => {
                    self.emit_constant(itarget, method, handler, pos)?;
                }
            }
        }

        let count = u32::try_from(positions.len()).unwrap_or(u32::MAX);
        itarget.target().record_injections(count);
        debug!(
            handler = %handler.name,
            method = %method.key(),
            count,
            "applied injector"
        );
        Ok(count)
    }

    fn emit_callback(
        &self,
        itarget: &InjectorTarget<'_>,
        method: &mut MethodNode,
        handler: &HandlerRef,
        pos: usize,
    ) {
        let target = itarget.target();
        let receiver = u16::from(!target.is_static());
        let mut code = Vec::with_capacity(self.handler_desc.args.len() + 2);
        if receiver == 1 {
            code.push(Insn::load(ValueKind::Ref, 0));
        }
        if !self.handler_desc.args.is_empty() {
            code.extend(load_args(target.desc(), receiver));
        }
        code.push(handler.call());
        method.insns.insert_before(pos, code);
        target.reserve_stack(method, receiver + self.handler_desc.arg_slots());
    }

    fn emit_redirect(
        &self,
        itarget: &InjectorTarget<'_>,
        method: &mut MethodNode,
        handler: &HandlerRef,
        pos: usize,
    ) -> Result<(), InjectionError> {
        let insn = method
            .insns
            .get(pos)
            .ok_or_else(|| InjectionError::invalid(format!("no instruction at {pos}")))?;
        let expected = redirected_signature(insn)?;
        if expected != self.handler_desc {
            return Err(InjectionError::invalid(format!(
                "redirect handler {} has descriptor {}, expected {expected} to redirect `{insn}`",
                self.handler_name, self.handler_desc
            )));
        }

        let target = itarget.target();
        let code = if handler.is_static {
            vec![handler.call()]
        } else {
            let slots: Vec<(ValueKind, u16)> = expected
                .args
                .iter()
                .map(|arg| {
                    let kind = arg.kind();
                    (kind, target.allocate_local(method, kind))
                })
                .collect();
            let mut code = Vec::with_capacity(slots.len() * 2 + 2);
            code.extend(slots.iter().rev().map(|&(kind, slot)| Insn::store(kind, slot)));
            code.push(Insn::load(ValueKind::Ref, 0));
            code.extend(slots.iter().map(|&(kind, slot)| Insn::load(kind, slot)));
            code.push(handler.call());
            code
        };
        method.insns.replace(pos, code);
        target.reserve_stack(method, 1);
        Ok(())
    }

    fn emit_constant(
        &self,
        itarget: &InjectorTarget<'_>,
        method: &mut MethodNode,
        handler: &HandlerRef,
        pos: usize,
    ) -> Result<(), InjectionError> {
        let Some(Insn::Const(constant)) = method.insns.get(pos) else {
            return Err(InjectionError::invalid(format!(
                "constant handler {} matched a non-constant instruction",
                self.handler_name
            )));
        };
        let ty = constant.type_desc();
        let accepts = self.handler_desc.args.len() == 1
            && self.handler_desc.ret == self.handler_desc.args[0]
            && self.handler_desc.ret.kind() == ty.kind()
            && (ty.kind() == ValueKind::Ref || self.handler_desc.ret == ty);
        if !accepts {
            return Err(InjectionError::invalid(format!(
                "constant handler {} has descriptor {}, expected ({ty}){ty}",
                self.handler_name, self.handler_desc
            )));
        }

        let target = itarget.target();
        let kind = ty.kind();
        let code = if handler.is_static {
            vec![handler.call()]
        } else {
            let slot = target.allocate_local(method, kind);
            vec![
                Insn::store(kind, slot),
                Insn::load(ValueKind::Ref, 0),
                Insn::load(kind, slot),
                handler.call(),
            ]
        };
        method.insns.insert_after(pos, code);
        target.reserve_stack(method, 1);
        Ok(())
    }
}

/// The handler signature that redirecting `insn` requires.
fn redirected_signature(insn: &Insn) -> Result<MethodDesc, InjectionError> {
    let parse = |d: &str| MethodDesc::parse(d).map_err(|e| InjectionError::invalid(e.to_string()));
    let field = |d: &str| TypeDesc::parse(d).map_err(|e| InjectionError::invalid(e.to_string()));
    match insn {
        Insn::Invoke { name, .. } if name == CTOR => Err(InjectionError::invalid(
            "constructor calls cannot be redirected",
        )),
        Insn::Invoke {
            op, owner, desc, ..
        } => {
            let md = parse(desc)?;
            Ok(if op.is_static() {
                md
            } else {
                md.with_leading_arg(TypeDesc::object(owner.as_str()))
            })
        }
        Insn::Field {
            op, owner, desc, ..
        } => {
            let ty = field(desc)?;
            let owner = TypeDesc::object(owner.as_str());
            Ok(match op {
                FieldOp::GetStatic => MethodDesc {
                    args: vec![],
                    ret: ty,
                },
                FieldOp::GetField => MethodDesc {
                    args: vec![owner],
                    ret: ty,
                },
                FieldOp::PutStatic => MethodDesc {
                    args: vec![ty],
                    ret: TypeDesc::Void,
                },
                FieldOp::PutField => MethodDesc {
                    args: vec![owner, ty],
                    ret: TypeDesc::Void,
                },
            })
        }
        other => Err(InjectionError::invalid(format!(
            "`{other}` cannot be redirected"
        ))),
    }
}
