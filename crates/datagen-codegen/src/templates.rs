//! Template sources, compiled into the binary.

/// Sections of a model module, in output order.
pub const MODEL_SECTIONS: &[(&str, &str)] = &[
    ("header", include_str!("../templates/model/header.hbs")),
    ("misc", include_str!("../templates/model/misc.hbs")),
    ("metadata", include_str!("../templates/model/metadata.hbs")),
    ("base_struct", include_str!("../templates/model/base_struct.hbs")),
    ("data_holder", include_str!("../templates/model/data_holder.hbs")),
    ("generator_struct", include_str!("../templates/model/generator_struct.hbs")),
    ("init_function", include_str!("../templates/model/init_function.hbs")),
    ("generator_funcs", include_str!("../templates/model/generator_funcs.hbs")),
    ("gen_function", include_str!("../templates/model/gen_function.hbs")),
    ("gen_entry", include_str!("../templates/model/gen_entry.hbs")),
    ("csv_function", include_str!("../templates/model/csv_function.hbs")),
    ("json_function", include_str!("../templates/model/json_function.hbs")),
    ("xml_function", include_str!("../templates/model/xml_function.hbs")),
    ("serialiser_function", include_str!("../templates/model/serialiser_function.hbs")),
];

pub const SINK_BINDING: &str = "sink_binding";

/// Once-per-run templates rendered from the commons context.
pub const COMMONS: &[(&str, &str)] = &[
    ("main", include_str!("../templates/commons/main.hbs")),
    ("commands", include_str!("../templates/commons/commands.hbs")),
    ("model_manager", include_str!("../templates/commons/model_manager.hbs")),
    ("sink_manager", include_str!("../templates/commons/sink_manager.hbs")),
    ("tags", include_str!("../templates/commons/tags.hbs")),
    ("runtime_mod", include_str!("../templates/commons/runtime_mod.hbs")),
    ("models_mod", include_str!("../templates/commons/models_mod.hbs")),
    ("sinks_mod", include_str!("../templates/commons/sinks_mod.hbs")),
    ("sink_kind_mod", include_str!("../templates/commons/sink_kind_mod.hbs")),
    ("cargo_toml", include_str!("../templates/commons/cargo_toml.hbs")),
    (SINK_BINDING, include_str!("../templates/commons/sink_binding.hbs")),
];
