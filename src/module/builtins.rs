//! Builtin Qt module catalog
//!
//! Modules shipped with Qt itself have no manifest in the workspace. Their
//! components are merged into the same lookup space as user modules but are never
//! persisted.

use std::collections::BTreeMap;
use std::sync::LazyLock;
use super::registry::{ComponentRecord, ModuleRegistry, ModuleRegistryEntry};

/// (component, version, is_singleton)
type BuiltinComponent = (&'static str, &'static str, bool);

const CATALOG: &[(&str, &str, &[BuiltinComponent])] = &[
    (
        "QtQml",
        "2.15",
        &[
            ("QtObject", "2.0", false),
            ("Component", "2.0", false),
            ("Binding", "2.0", false),
            ("Connections", "2.0", false),
            ("Timer", "2.0", false),
            ("Instantiator", "2.1", false),
            ("Qt", "2.0", true),
        ],
    ),
    (
        "QtQuick",
        "2.15",
        &[
            ("Item", "2.0", false),
            ("Rectangle", "2.0", false),
            ("Text", "2.0", false),
            ("TextInput", "2.0", false),
            ("TextEdit", "2.0", false),
            ("Image", "2.0", false),
            ("MouseArea", "2.0", false),
            ("Flickable", "2.0", false),
            ("ListView", "2.0", false),
            ("GridView", "2.0", false),
            ("Repeater", "2.0", false),
            ("Loader", "2.0", false),
            ("Column", "2.0", false),
            ("Row", "2.0", false),
            ("Grid", "2.0", false),
            ("Flow", "2.0", false),
            ("FocusScope", "2.0", false),
            ("Canvas", "2.0", false),
            ("PropertyAnimation", "2.0", false),
            ("NumberAnimation", "2.0", false),
            ("ColorAnimation", "2.0", false),
            ("SequentialAnimation", "2.0", false),
            ("ParallelAnimation", "2.0", false),
            ("State", "2.0", false),
            ("Transition", "2.0", false),
            ("Behavior", "2.0", false),
            ("TapHandler", "2.12", false),
            ("DragHandler", "2.12", false),
            ("HoverHandler", "2.12", false),
        ],
    ),
    (
        "QtQuick.Window",
        "2.15",
        &[("Window", "2.0", false), ("Screen", "2.0", true)],
    ),
    (
        "QtQuick.Layouts",
        "1.15",
        &[
            ("RowLayout", "1.0", false),
            ("ColumnLayout", "1.0", false),
            ("GridLayout", "1.0", false),
            ("StackLayout", "1.3", false),
        ],
    ),
    (
        "QtQuick.Controls",
        "2.15",
        &[
            ("ApplicationWindow", "2.0", false),
            ("Button", "2.0", false),
            ("CheckBox", "2.0", false),
            ("ComboBox", "2.0", false),
            ("Dialog", "2.1", false),
            ("Drawer", "2.0", false),
            ("Label", "2.0", false),
            ("Menu", "2.0", false),
            ("MenuItem", "2.0", false),
            ("Page", "2.0", false),
            ("Pane", "2.0", false),
            ("Popup", "2.0", false),
            ("ProgressBar", "2.0", false),
            ("RadioButton", "2.0", false),
            ("ScrollView", "2.2", false),
            ("Slider", "2.0", false),
            ("SpinBox", "2.0", false),
            ("StackView", "2.0", false),
            ("Switch", "2.0", false),
            ("TabBar", "2.0", false),
            ("TabButton", "2.0", false),
            ("TextArea", "2.0", false),
            ("TextField", "2.0", false),
            ("ToolBar", "2.0", false),
            ("ToolButton", "2.0", false),
            ("ToolTip", "2.0", false),
        ],
    ),
    (
        "QtQuick.Dialogs",
        "6.2",
        &[
            ("FileDialog", "6.2", false),
            ("FolderDialog", "6.3", false),
            ("ColorDialog", "6.4", false),
            ("MessageDialog", "6.3", false),
        ],
    ),
];

static BUILTINS: LazyLock<ModuleRegistry> = LazyLock::new(build_registry);

/// The builtin catalog, built on first use
pub fn builtin_modules() -> &'static ModuleRegistry {
    &BUILTINS
}

fn build_registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    for (module, version, components) in CATALOG {
        let components: BTreeMap<String, ComponentRecord> = components
            .iter()
            .map(|(name, version, is_singleton)| {
                let record = ComponentRecord {
                    name: name.to_string(),
                    file_path: None,
                    is_builtin: true,
                    is_singleton: *is_singleton,
                    version: Some(version.to_string()),
                };
                (name.to_string(), record)
            })
            .collect();

        registry.insert(ModuleRegistryEntry {
            name: module.to_string(),
            version: version.to_string(),
            manifest_path: None,
            last_modified: None,
            components,
        });
    }
    registry
}
