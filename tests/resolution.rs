use armory::{
    Binding, Injectable, InstantiateErrorKind, Kernel, MemberInfo, Parameter, ParameterDescriptor, Request, ResolveErrorKind,
    Settings, TypeDescriptor, TypeInfo,
};
use core::marker::PhantomData;
use parking_lot::Mutex;
use std::{
    sync::{mpsc, Arc},
    thread,
    time::Duration,
};
use tracing_test::traced_test;

trait Weapon: Send + Sync {
    fn name(&self) -> &'static str;
}

trait Warrior: Send + Sync {
    fn weapon(&self) -> &'static str;
}

struct Sword;

impl Weapon for Sword {
    fn name(&self) -> &'static str {
        "sword"
    }
}

impl Injectable for Sword {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::concrete::<Sword>()
            .implements::<dyn Weapon>(|sword| sword)
            .constructor(MemberInfo::public("new"), Vec::new(), |_| Ok(Sword))
            .build()
    }
}

struct Shuriken;

impl Weapon for Shuriken {
    fn name(&self) -> &'static str {
        "shuriken"
    }
}

impl Injectable for Shuriken {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::concrete::<Shuriken>()
            .implements::<dyn Weapon>(|shuriken| shuriken)
            .constructor(MemberInfo::public("new"), Vec::new(), |_| Ok(Shuriken))
            .build()
    }
}

struct Ninja {
    weapon: Arc<dyn Weapon>,
}

impl Warrior for Ninja {
    fn weapon(&self) -> &'static str {
        self.weapon.name()
    }
}

impl Injectable for Ninja {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::concrete::<Ninja>()
            .implements::<dyn Warrior>(|ninja| ninja)
            .constructor(
                MemberInfo::public("new"),
                vec![ParameterDescriptor::of::<dyn Weapon>("weapon")],
                |arguments| {
                    Ok(Ninja {
                        weapon: arguments.get(0)?,
                    })
                },
            )
            .build()
    }
}

struct Samurai {
    weapon: Arc<dyn Weapon>,
    rival: Option<Arc<dyn Warrior>>,
}

impl Warrior for Samurai {
    fn weapon(&self) -> &'static str {
        self.weapon.name()
    }
}

impl Injectable for Samurai {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::concrete::<Samurai>()
            .implements::<dyn Warrior>(|samurai| samurai)
            .constructor(
                MemberInfo::public("new"),
                vec![ParameterDescriptor::of::<dyn Weapon>("weapon")],
                |arguments| {
                    Ok(Samurai {
                        weapon: arguments.get(0)?,
                        rival: None,
                    })
                },
            )
            .constructor(
                MemberInfo::public("with_rival"),
                vec![
                    ParameterDescriptor::of::<dyn Weapon>("weapon"),
                    ParameterDescriptor::of::<dyn Warrior>("rival"),
                ],
                |arguments| {
                    Ok(Samurai {
                        weapon: arguments.get(0)?,
                        rival: Some(arguments.get(1)?),
                    })
                },
            )
            .build()
    }
}

fn settings() -> Settings {
    Settings {
        cache_pruning_interval: None,
        ..Settings::default()
    }
}

fn weapons() -> Kernel {
    Kernel::builder()
        .settings(settings())
        .describe_type::<Sword>()
        .describe_type::<Shuriken>()
        .describe_type::<Ninja>()
        .describe_type::<Samurai>()
        .bind(Binding::bind::<dyn Weapon>().to::<Sword>())
        .bind(Binding::bind::<dyn Weapon>().to::<Shuriken>())
        .build()
}

#[test]
#[traced_test]
fn test_ambiguous_binding() {
    let kernel = weapons();

    let err = kernel.get::<dyn Weapon>().err().unwrap();
    let ResolveErrorKind::AmbiguousBinding { candidates, .. } = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(candidates.len(), 2);

    let names: Vec<&str> = kernel.get_all::<dyn Weapon>().unwrap().iter().map(|weapon| weapon.name()).collect();
    assert_eq!(names, vec!["sword", "shuriken"]);
}

#[test]
#[traced_test]
fn test_explicit_binding_beats_implicit() {
    let kernel = Kernel::builder()
        .settings(settings())
        .describe_type::<Sword>()
        .bind(Binding::bind::<Sword>().to_method(|_, _| Ok::<_, InstantiateErrorKind>(Sword)).named("forged"))
        .build();

    // Explicit binding suppresses the self binding fallback
    kernel.get::<Sword>().unwrap();
    assert_eq!(kernel.registry().len(), 1);
}

#[test]
#[traced_test]
fn test_named_binding() {
    let kernel = Kernel::builder()
        .settings(settings())
        .describe_type::<Sword>()
        .describe_type::<Shuriken>()
        .bind(Binding::bind::<dyn Weapon>().to::<Sword>().named("sharp"))
        .bind(Binding::bind::<dyn Weapon>().to::<Shuriken>().named("thrown"))
        .build();

    assert_eq!(kernel.get_named::<dyn Weapon>("thrown").unwrap().name(), "shuriken");
    assert_eq!(kernel.get_named::<dyn Weapon>("sharp").unwrap().name(), "sword");
    assert!(matches!(
        kernel.get_named::<dyn Weapon>("blunt"),
        Err(ResolveErrorKind::NotResolvable { .. })
    ));
}

#[test]
#[traced_test]
fn test_named_dependency() {
    struct Archer {
        weapon: Arc<dyn Weapon>,
    }

    let kernel = Kernel::builder()
        .settings(settings())
        .describe_type::<Sword>()
        .describe_type::<Shuriken>()
        .describe(
            TypeDescriptor::concrete::<Archer>()
                .constructor(
                    MemberInfo::public("new"),
                    vec![ParameterDescriptor::of::<dyn Weapon>("weapon").named("thrown")],
                    |arguments| {
                        Ok(Archer {
                            weapon: arguments.get(0)?,
                        })
                    },
                )
                .build(),
        )
        .bind(Binding::bind::<dyn Weapon>().to::<Sword>().named("sharp"))
        .bind(Binding::bind::<dyn Weapon>().to::<Shuriken>().named("thrown"))
        .build();

    assert_eq!(kernel.get::<Archer>().unwrap().weapon.name(), "shuriken");
}

#[test]
#[traced_test]
fn test_constructor_with_most_resolvable_parameters_wins() {
    let kernel = Kernel::builder()
        .settings(settings())
        .describe_type::<Sword>()
        .describe_type::<Ninja>()
        .describe_type::<Samurai>()
        .bind(Binding::bind::<dyn Weapon>().to::<Sword>())
        .bind(Binding::bind::<dyn Warrior>().to::<Ninja>())
        .build();

    let samurai = kernel.get::<Samurai>().unwrap();
    assert_eq!(samurai.weapon(), "sword");
    assert_eq!(samurai.rival.as_ref().map(|rival| rival.weapon()), Some("sword"));
}

#[test]
#[traced_test]
fn test_unresolvable_constructor_loses() {
    let kernel = Kernel::builder()
        .settings(settings())
        .describe_type::<Sword>()
        .describe_type::<Samurai>()
        .bind(Binding::bind::<dyn Weapon>().to::<Sword>())
        .build();

    assert!(kernel.get::<Samurai>().unwrap().rival.is_none());
}

#[test]
#[traced_test]
fn test_ambiguous_constructor() {
    struct Monk;

    let kernel = Kernel::builder()
        .settings(settings())
        .describe(
            TypeDescriptor::concrete::<Monk>()
                .constructor(MemberInfo::public("new"), Vec::new(), |_| Ok(Monk))
                .constructor(MemberInfo::public("default"), Vec::new(), |_| Ok(Monk))
                .build(),
        )
        .build();

    assert!(matches!(
        kernel.get::<Monk>(),
        Err(ResolveErrorKind::AmbiguousConstructor { score: 1, .. })
    ));
}

#[test]
#[traced_test]
fn test_marked_constructor_wins() {
    struct Monk(u8);

    let kernel = Kernel::builder()
        .settings(settings())
        .describe_type::<Sword>()
        .describe(
            TypeDescriptor::concrete::<Monk>()
                .constructor(
                    MemberInfo::public("armed"),
                    vec![ParameterDescriptor::of::<Sword>("sword")],
                    |_| Ok(Monk(1)),
                )
                .constructor(MemberInfo::public("unarmed").injected(), Vec::new(), |_| Ok(Monk(0)))
                .build(),
        )
        .build();

    assert_eq!(kernel.get::<Monk>().unwrap().0, 0);
}

#[test]
#[traced_test]
fn test_no_constructors_available() {
    struct Ghost;

    let kernel = Kernel::builder()
        .settings(settings())
        .describe(
            TypeDescriptor::concrete::<Ghost>()
                .constructor(MemberInfo::private("new"), Vec::new(), |_| Ok(Ghost))
                .build(),
        )
        .build();

    assert!(matches!(
        kernel.get::<Ghost>(),
        Err(ResolveErrorKind::NoConstructorsAvailable { .. })
    ));
}

#[test]
#[traced_test]
fn test_cyclic_dependency() {
    struct X;
    struct Y;

    let kernel = Kernel::builder()
        .settings(settings())
        .describe(
            TypeDescriptor::concrete::<X>()
                .constructor(MemberInfo::public("new"), vec![ParameterDescriptor::of::<Y>("y")], |_| Ok(X))
                .build(),
        )
        .describe(
            TypeDescriptor::concrete::<Y>()
                .constructor(MemberInfo::public("new"), vec![ParameterDescriptor::of::<X>("x")], |_| Ok(Y))
                .build(),
        )
        .build();

    let err = kernel.get::<X>().err().unwrap();
    let ResolveErrorKind::CyclicDependency { service, path } = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(*service, TypeInfo::of::<X>());
    assert_eq!(path.len(), 3);
}

#[test]
#[traced_test]
fn test_cyclic_dependency_through_scoped_bindings() {
    struct Blade {
        _weapon: Arc<dyn Weapon>,
    }

    impl Weapon for Blade {
        fn name(&self) -> &'static str {
            "blade"
        }
    }

    for serialize_scoped_construction in [true, false] {
        let kernel = Kernel::builder()
            .settings(Settings {
                serialize_scoped_construction,
                ..settings()
            })
            .describe(
                TypeDescriptor::concrete::<Blade>()
                    .implements::<dyn Weapon>(|blade| blade)
                    .constructor(
                        MemberInfo::public("new"),
                        vec![ParameterDescriptor::of::<dyn Weapon>("weapon")],
                        |arguments| {
                            Ok(Blade {
                                _weapon: arguments.get(0)?,
                            })
                        },
                    )
                    .build(),
            )
            .bind(Binding::bind::<Blade>().to_self().in_singleton_scope())
            .bind(Binding::bind::<dyn Weapon>().to::<Blade>().in_singleton_scope())
            .build();

        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || {
            let result = kernel.get::<Blade>().map(|_| ());
            let _ = sender.send(result);
        });

        let err = receiver
            .recv_timeout(Duration::from_secs(10))
            .expect("resolution finished")
            .err()
            .unwrap();
        let ResolveErrorKind::CyclicDependency { service, .. } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(*service, TypeInfo::of::<dyn Weapon>());
    }
}

#[test]
#[traced_test]
fn test_parameter_inheritance() {
    struct Katana {
        owner: Option<Arc<String>>,
    }

    struct Ronin {
        katana: Arc<Katana>,
    }

    let kernel = Kernel::builder()
        .settings(settings())
        .describe(
            TypeDescriptor::concrete::<Katana>()
                .constructor(
                    MemberInfo::public("new"),
                    vec![ParameterDescriptor::of::<String>("owner").optional()],
                    |arguments| {
                        Ok(Katana {
                            owner: arguments.optional(0)?,
                        })
                    },
                )
                .build(),
        )
        .describe(
            TypeDescriptor::concrete::<Ronin>()
                .constructor(
                    MemberInfo::public("new"),
                    vec![ParameterDescriptor::of::<Katana>("katana")],
                    |arguments| {
                        Ok(Ronin {
                            katana: arguments.get(0)?,
                        })
                    },
                )
                .build(),
        )
        .build();

    let inherited = kernel
        .get_with::<Ronin, _>([Parameter::constructor_argument("owner", String::from("Musashi")).inherited(true)])
        .unwrap();
    assert_eq!(inherited.katana.owner.as_deref().map(String::as_str), Some("Musashi"));

    let not_inherited = kernel
        .get_with::<Ronin, _>([Parameter::constructor_argument("owner", String::from("Kojiro"))])
        .unwrap();
    assert!(not_inherited.katana.owner.is_none());

    let direct = kernel
        .get_with_request::<Katana>(
            Request::of::<Katana>().with_parameter(Parameter::constructor_argument("owner", String::from("Kojiro"))),
        )
        .unwrap();
    assert_eq!(direct.owner.as_deref().map(String::as_str), Some("Kojiro"));
}

#[test]
#[traced_test]
fn test_duplicate_parameter() {
    let kernel = Kernel::builder().settings(settings()).describe_type::<Sword>().build();

    let result = kernel.get_with::<Sword, _>([
        Parameter::constructor_argument("edge", 1u8),
        Parameter::constructor_argument("edge", 2u8),
    ]);
    assert!(matches!(result, Err(ResolveErrorKind::DuplicateParameter { .. })));
}

#[test]
#[traced_test]
fn test_conditional_binding_precedence() {
    let kernel = Kernel::builder()
        .settings(settings())
        .describe_type::<Sword>()
        .describe_type::<Shuriken>()
        .describe_type::<Ninja>()
        .describe_type::<Samurai>()
        .bind(Binding::bind::<dyn Weapon>().to::<Shuriken>())
        .bind(Binding::bind::<dyn Weapon>().to::<Sword>().when_injected_into::<Samurai>())
        .build();

    assert_eq!(kernel.get::<Samurai>().unwrap().weapon(), "sword");
    assert_eq!(kernel.get::<Ninja>().unwrap().weapon(), "shuriken");
    assert_eq!(kernel.get::<dyn Weapon>().unwrap().name(), "shuriken");
}

#[test]
#[traced_test]
fn test_collection_dependency() {
    struct Armory {
        weapons: Vec<Arc<dyn Weapon>>,
    }

    let describe = || {
        TypeDescriptor::concrete::<Armory>()
            .constructor(
                MemberInfo::public("new"),
                vec![ParameterDescriptor::all::<dyn Weapon>("weapons")],
                |arguments| {
                    Ok(Armory {
                        weapons: arguments.all(0)?,
                    })
                },
            )
            .build()
    };

    let kernel = Kernel::builder()
        .settings(settings())
        .describe_type::<Sword>()
        .describe_type::<Shuriken>()
        .describe(describe())
        .bind(Binding::bind::<dyn Weapon>().to::<Sword>())
        .bind(Binding::bind::<dyn Weapon>().to::<Shuriken>())
        .build();

    let names: Vec<&str> = kernel.get::<Armory>().unwrap().weapons.iter().map(|weapon| weapon.name()).collect();
    assert_eq!(names, vec!["sword", "shuriken"]);

    let empty = Kernel::builder().settings(settings()).describe(describe()).build();
    assert!(empty.get::<Armory>().unwrap().weapons.is_empty());
}

#[test]
#[traced_test]
fn test_default_value() {
    struct Dojo {
        students: Arc<u8>,
    }

    let kernel = Kernel::builder()
        .settings(settings())
        .describe(
            TypeDescriptor::concrete::<Dojo>()
                .constructor(
                    MemberInfo::public("new"),
                    vec![ParameterDescriptor::of::<u8>("students").with_default(8u8)],
                    |arguments| {
                        Ok(Dojo {
                            students: arguments.get(0)?,
                        })
                    },
                )
                .build(),
        )
        .build();

    assert_eq!(*kernel.get::<Dojo>().unwrap().students, 8);
    // Default-value bindings are never registered
    assert_eq!(kernel.registry().get(&TypeInfo::of::<u8>()).len(), 0);
}

#[test]
#[traced_test]
fn test_open_generic_binding() {
    trait Repository<T>: Send + Sync {
        fn entity(&self) -> &'static str;
    }

    struct RepositoryDef;
    struct SqlRepositoryDef;

    struct SqlRepository<T>(PhantomData<fn() -> T>);

    impl<T> Repository<T> for SqlRepository<T> {
        fn entity(&self) -> &'static str {
            core::any::type_name::<T>().rsplit("::").next().unwrap_or_default()
        }
    }

    struct User;
    struct Order;

    let kernel = Kernel::builder()
        .settings(settings())
        .describe(
            TypeDescriptor::interface::<dyn Repository<User>>()
                .generic_of::<RepositoryDef>(vec![TypeInfo::of::<User>()])
                .build(),
        )
        .describe(
            TypeDescriptor::interface::<dyn Repository<Order>>()
                .generic_of::<RepositoryDef>(vec![TypeInfo::of::<Order>()])
                .build(),
        )
        .describe(
            TypeDescriptor::concrete::<SqlRepository<User>>()
                .generic_of::<SqlRepositoryDef>(vec![TypeInfo::of::<User>()])
                .implements::<dyn Repository<User>>(|repository| repository)
                .constructor(MemberInfo::public("new"), Vec::new(), |_| Ok(SqlRepository(PhantomData)))
                .build(),
        )
        .bind(Binding::bind_open_generic::<RepositoryDef>().to::<SqlRepositoryDef>())
        .build();

    assert_eq!(kernel.get::<dyn Repository<User>>().unwrap().entity(), "User");
    assert!(matches!(
        kernel.get::<dyn Repository<Order>>(),
        Err(ResolveErrorKind::OpenGenericNotClosed { .. })
    ));
}

#[test]
#[traced_test]
fn test_auto_bindable_binding() {
    let kernel = Kernel::builder()
        .settings(settings())
        .describe_type::<Sword>()
        .bind(Binding::bind::<Sword>().to_self().in_singleton_scope().auto_bindable())
        .build();

    let weapon = kernel.get::<dyn Weapon>().unwrap();
    let sword = kernel.get::<Sword>().unwrap();
    assert_eq!(weapon.name(), "sword");
    assert_eq!(
        Arc::as_ptr(&weapon).cast::<()>(),
        Arc::as_ptr(&sword).cast::<()>()
    );
}

#[test]
#[traced_test]
fn test_activation_path() {
    let kernel = Kernel::builder().settings(settings()).describe_type::<Ninja>().build();

    let err = kernel.get::<Ninja>().err().unwrap();
    let path = err.path().unwrap();
    assert_eq!(
        path.0,
        vec![
            "Injection of dependency Weapon into parameter weapon of constructor new of type Ninja".to_owned(),
            "Request for Ninja".to_owned(),
        ]
    );
}

struct Knight {
    events: Mutex<Vec<&'static str>>,
    weapon: Mutex<Option<Arc<dyn Weapon>>>,
}

impl Injectable for Knight {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::concrete::<Knight>()
            .constructor(MemberInfo::public("new"), Vec::new(), |_| {
                Ok(Knight {
                    events: Mutex::new(vec!["constructed"]),
                    weapon: Mutex::new(None),
                })
            })
            .property::<dyn Weapon, _>(MemberInfo::public("weapon").injected(), |knight, weapon| {
                knight.events.lock().push("weapon");
                *knight.weapon.lock() = Some(weapon);
                Ok(())
            })
            .method(
                MemberInfo::public("train").injected(),
                vec![ParameterDescriptor::of::<Shuriken>("shuriken")],
                |knight, arguments| {
                    let _shuriken: Arc<Shuriken> = arguments.get(0)?;
                    knight.events.lock().push("train");
                    Ok(())
                },
            )
            .method(MemberInfo::public("rest"), Vec::new(), |knight, _| {
                knight.events.lock().push("rest");
                Ok(())
            })
            .build()
    }
}

#[test]
#[traced_test]
fn test_member_injection_order() {
    let kernel = Kernel::builder()
        .settings(settings())
        .describe_type::<Sword>()
        .describe_type::<Shuriken>()
        .describe_type::<Knight>()
        .bind(Binding::bind::<dyn Weapon>().to::<Sword>())
        .build();

    let knight = kernel.get::<Knight>().unwrap();
    assert_eq!(*knight.events.lock(), vec!["constructed", "weapon", "train"]);
    assert_eq!(knight.weapon.lock().as_ref().map(|weapon| weapon.name()), Some("sword"));
}

#[test]
#[traced_test]
fn test_member_injection_disabled() {
    let kernel = Kernel::builder()
        .settings(Settings {
            property_injection: false,
            method_injection: false,
            ..settings()
        })
        .describe_type::<Sword>()
        .describe_type::<Knight>()
        .bind(Binding::bind::<dyn Weapon>().to::<Sword>())
        .build();

    let knight = kernel.get::<Knight>().unwrap();
    assert_eq!(*knight.events.lock(), vec!["constructed"]);
    assert!(knight.weapon.lock().is_none());
}

