//! Built-in demo catalog.
//!
//! Stands in for a discovery collaborator: a fixed set of descriptors with bodies that exercise synchronous bodies,
//! multi-step bodies, custom set-up/tear-down hooks and, optionally, failures.

use framerunner_core::Descriptor;

use crate::body::{Body, TestFn, test_fn};
use crate::context::{Fixture, FixtureHandle};
use crate::hooks::HookRegistry;

const UI_WINDOW: &str = "ui_window";

/// Fixture component used by the `ui` suite.
#[derive(Debug, Default)]
pub struct Window {
    pub open_menus: usize,
    pub clicks: usize,
}

/// Hooks the demo descriptors refer to by name.
pub fn hooks() -> HookRegistry {
    let mut hooks = HookRegistry::new();
    hooks.register_set_up(UI_WINDOW, |descriptor| {
        tracing::debug!(path = descriptor.path(), "opening demo window");
        Box::new(Fixture::new(FixtureHandle(1_000)).with_component(Window::default()))
    });
    hooks.register_tear_down(UI_WINDOW, |fixture| {
        let clicks = fixture.get::<Window>().map_or(0, |window| window.clicks);
        tracing::debug!(clicks, "closing demo window");
    });
    hooks
}

/// The demo discovery batch.
pub fn catalog(with_failures: bool) -> Vec<(Descriptor, TestFn)> {
    let ui = |path: &str| {
        Descriptor::new(path)
            .in_suite()
            .with_set_up(UI_WINDOW)
            .with_tear_down(UI_WINDOW)
            .with_origin("demo::ui")
    };

    let mut batch = vec![
        (Descriptor::new("physics/gravity").with_origin("demo::physics"), falling_body()),
        (
            Descriptor::new("physics/collision/bounce"),
            test_fn(|ctx| {
                let (velocity, restitution) = (-4.0_f64, 0.5_f64);
                ctx.check(-velocity * restitution == 2.0, "bounce lost energy incorrectly");
                Ok(Body::Complete)
            }),
        ),
        (
            Descriptor::new("physics/collision/rest"),
            test_fn(|_| {
                Ok(Body::steps(3, |ctx, step| {
                    ctx.check(step < 3, "settled too late");
                    Ok(())
                }))
            }),
        ),
        (
            ui("ui/button/press"),
            test_fn(|ctx| {
                let window = ctx.component::<Window>()?;
                window.clicks += 1;
                let clicks = window.clicks;
                ctx.check_eq(clicks, 1);
                Ok(Body::Complete)
            }),
        ),
        (
            ui("ui/menu/open"),
            test_fn(|_| {
                Ok(Body::steps(2, |ctx, _| {
                    ctx.component::<Window>()?.open_menus += 1;
                    Ok(())
                }))
            }),
        ),
        (Descriptor::new("net/handshake"), test_fn(|_| Ok(Body::Complete))),
    ];

    if with_failures {
        batch.push((
            Descriptor::new("physics/friction"),
            test_fn(|ctx| {
                let slide = 10.0_f64 * 0.8;
                ctx.check_eq(slide, 10.0);
                Ok(Body::Complete)
            }),
        ));
        batch.push((
            Descriptor::new("net/timeout").with_pause_on_fail(true),
            test_fn(|_| {
                Ok(Body::steps(4, |ctx, step| {
                    if step == 1 {
                        ctx.fail("no response after 2 frames");
                    }
                    Ok(())
                }))
            }),
        ));
    }
    batch
}

/// Integrates a falling body over five frames.
fn falling_body() -> TestFn {
    test_fn(|_| {
        let mut height = 10.0_f64;
        let mut velocity = 0.0_f64;
        Ok(Body::steps(5, move |ctx, step| {
            velocity -= 1.0;
            height += velocity;
            if step == 4 {
                ctx.check(height <= 0.0, format!("body still at {height} after {} frames", step + 1));
            }
            Ok(())
        }))
    })
}
