//! Read-only views of the running bot that instrumented handlers consult.

use std::fmt;
use std::sync::{Arc, Weak};

/// Ambient state of the running bot.
pub trait BotState: Send + Sync {
    /// Display name of the bot account, once logged in.
    fn current_user(&self) -> Option<String>;

    /// Number of guilds the bot is connected to.
    fn guild_count(&self) -> Option<usize>;
}

/// Weak back-reference to the bot state.
///
/// Never keeps the bot alive; every read tolerates a missing or dropped
/// target.
#[derive(Clone, Default)]
pub struct StateHandle {
    inner: Option<Weak<dyn BotState>>,
}

impl StateHandle {
    /// Handle pointing at nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Handle observing `state` without owning it.
    pub fn new<S: BotState + 'static>(state: &Arc<S>) -> Self {
        let weak: Weak<S> = Arc::downgrade(state);
        let weak: Weak<dyn BotState> = weak;
        Self { inner: Some(weak) }
    }

    /// The bot state, if it is still alive.
    pub fn upgrade(&self) -> Option<Arc<dyn BotState>> {
        self.inner.as_ref()?.upgrade()
    }
}

impl fmt::Debug for StateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateHandle")
            .field("attached", &self.inner.is_some())
            .field("alive", &self.upgrade().is_some())
            .finish()
    }
}

/// A user interaction (slash command, button press) handed to a handler.
pub trait Interaction: Send + Sync {
    /// Invoking user's id
    fn user_id(&self) -> u64;

    /// Invoking user's display name
    fn user_name(&self) -> &str;

    /// Guild the interaction came from; `None` for direct messages
    fn guild_id(&self) -> Option<u64>;
}

/// Argument values a handler can be invoked with.
///
/// Only the first argument is inspected: tuples delegate to their first
/// element. Types that are not interactions keep the default.
pub trait InvocationArgs {
    /// The interaction carried by these arguments, if any.
    fn interaction(&self) -> Option<&dyn Interaction> {
        None
    }
}

macro_rules! no_interaction {
    ($($ty:ty),* $(,)?) => {
        $(impl InvocationArgs for $ty {})*
    };
}

no_interaction!(
    (),
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    usize,
    i8,
    i16,
    i32,
    i64,
    isize,
    f32,
    f64,
    String,
    &'static str,
);

macro_rules! first_element {
    ($first:ident $(, $rest:ident)*) => {
        impl<$first: InvocationArgs, $($rest),*> InvocationArgs for ($first, $($rest,)*) {
            fn interaction(&self) -> Option<&dyn Interaction> {
                self.0.interaction()
            }
        }
    };
}

first_element!(A);
first_element!(A, B);
first_element!(A, B, C);
first_element!(A, B, C, D);
first_element!(A, B, C, D, E);

impl<T: InvocationArgs + ?Sized> InvocationArgs for Arc<T> {
    fn interaction(&self) -> Option<&dyn Interaction> {
        (**self).interaction()
    }
}

impl<T: InvocationArgs + ?Sized> InvocationArgs for Box<T> {
    fn interaction(&self) -> Option<&dyn Interaction> {
        (**self).interaction()
    }
}

impl<T: InvocationArgs> InvocationArgs for Option<T> {
    fn interaction(&self) -> Option<&dyn Interaction> {
        self.as_ref()?.interaction()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlashCommand {
        user: u64,
        guild: Option<u64>,
    }

    impl Interaction for SlashCommand {
        fn user_id(&self) -> u64 {
            self.user
        }

        fn user_name(&self) -> &str {
            "ferris"
        }

        fn guild_id(&self) -> Option<u64> {
            self.guild
        }
    }

    impl InvocationArgs for SlashCommand {
        fn interaction(&self) -> Option<&dyn Interaction> {
            Some(self)
        }
    }

    struct Bot;

    impl BotState for Bot {
        fn current_user(&self) -> Option<String> {
            Some("beacon#0001".into())
        }

        fn guild_count(&self) -> Option<usize> {
            Some(3)
        }
    }

    #[test]
    fn test_tuple_uses_first_element() {
        let args = (SlashCommand { user: 7, guild: None }, "extra", 3u8);
        assert_eq!(args.interaction().map(|i| i.user_id()), Some(7));

        let reversed = ("extra", SlashCommand { user: 7, guild: None });
        assert!(reversed.interaction().is_none());
    }

    #[test]
    fn test_plain_values_have_no_interaction() {
        assert!(().interaction().is_none());
        assert!(42u64.interaction().is_none());
        assert!(String::from("hi").interaction().is_none());
        assert!(None::<SlashCommand>.interaction().is_none());
    }

    #[test]
    fn test_wrappers_delegate() {
        let shared = Arc::new(SlashCommand { user: 1, guild: Some(9) });
        assert_eq!(shared.interaction().and_then(|i| i.guild_id()), Some(9));

        let boxed = Box::new(SlashCommand { user: 2, guild: None });
        assert_eq!(boxed.interaction().map(|i| i.user_name()), Some("ferris"));
    }

    #[test]
    fn test_state_handle_is_weak() {
        let bot = Arc::new(Bot);
        let handle = StateHandle::new(&bot);

        let state = handle.upgrade().expect("bot alive");
        assert_eq!(state.guild_count(), Some(3));
        drop(state);

        drop(bot);
        assert!(handle.upgrade().is_none());
        assert!(StateHandle::none().upgrade().is_none());
    }
}
