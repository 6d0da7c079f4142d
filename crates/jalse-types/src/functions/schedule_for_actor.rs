use super::{erase, expect_no_params, find_annotation, reject_default};
use super::{EntityMethod, EntityMethodFunction};
use crate::decl::{ActionFactory, Annotation, MethodSig, ScheduleSpec, TypeRef};
use crate::error::{MethodError, Result};
use crate::proxy::{Arg, EntityProxy, Return};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Schedules a freshly built action with the proxy as its actor
///
/// The task belongs to the proxied entity and is cancelled when it dies.
#[derive(Clone)]
pub struct ScheduleForActorMethod {
    action: ActionFactory,
    initial_delay: Duration,
    period: Duration,
    returns_task: bool,
}

impl ScheduleForActorMethod {
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl EntityMethod for ScheduleForActorMethod {
    fn invoke(&self, proxy: &EntityProxy, _args: &[Arg]) -> Result<Return> {
        let action = (self.action)();
        let id = proxy.entity().schedule_with_actor(
            action,
            proxy.clone(),
            self.initial_delay,
            self.period,
        )?;
        Ok(if self.returns_task {
            Return::Task(Some(id))
        } else {
            Return::Void
        })
    }
}

impl fmt::Debug for ScheduleForActorMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduleForActorMethod")
            .field("initial_delay", &self.initial_delay)
            .field("period", &self.period)
            .field("returns_task", &self.returns_task)
            .finish_non_exhaustive()
    }
}

/// Resolver for [`Annotation::ScheduleForActor`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleForActorFunction;

fn non_negative(field: &'static str, amount: i64) -> std::result::Result<u64, MethodError> {
    u64::try_from(amount).map_err(|_| MethodError::NegativeAmount { field, amount })
}

impl ScheduleForActorFunction {
    pub fn resolve(
        &self,
        method: &MethodSig,
    ) -> std::result::Result<Option<ScheduleForActorMethod>, MethodError> {
        let Some(spec) = find_annotation(method, |a| match a {
            Annotation::ScheduleForActor(spec) => Some(spec),
            _ => None,
        }) else {
            return Ok(None);
        };
        reject_default(method)?;
        expect_no_params(method)?;

        let returns_task = match method.return_type().unwrap_optional() {
            (TypeRef::Void, false) => false,
            (TypeRef::Task, _) => true,
            _ => {
                return Err(MethodError::ReturnType {
                    expected: "a task id, Option of one, or void",
                    got: method.return_type().clone(),
                })
            }
        };

        let ScheduleSpec {
            action,
            initial_delay,
            period,
            unit,
        } = spec;
        let initial_delay = unit.to_duration(non_negative("initial delay", *initial_delay)?);
        let period = unit.to_duration(non_negative("period", *period)?);

        Ok(Some(ScheduleForActorMethod {
            action: action.clone(),
            initial_delay,
            period,
            returns_task,
        }))
    }
}

impl EntityMethodFunction for ScheduleForActorFunction {
    fn name(&self) -> &'static str {
        "ScheduleForActor"
    }

    fn apply(
        &self,
        method: &MethodSig,
    ) -> std::result::Result<Option<Arc<dyn EntityMethod>>, MethodError> {
        erase(self.resolve(method))
    }
}
