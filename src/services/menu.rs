use std::collections::HashMap;

use crate::database::models::{MenuModule, MenuRow, ModuleMenuUser};

/// Collapses module/view rows into modules with their views, keeping row order
pub fn group_menu_rows(rows: Vec<MenuRow>) -> Vec<ModuleMenuUser> {
    let mut modules: Vec<ModuleMenuUser> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for MenuRow { module, view } in rows {
        let i = match index.get(&module.id) {
            Some(&i) => i,
            None => {
                index.insert(module.id.clone(), modules.len());
                modules.push(module);
                modules.len() - 1
            }
        };
        if let Some(view) = view {
            if !modules[i].views.iter().any(|v| v.id == view.id) {
                modules[i].views.push(view);
            }
        }
    }

    modules
}

/// Builds the two-level menu from dotted module codes.
///
/// A code without a dot is a top-level node. Any other code is nested under the
/// node named by its first segment; that node is synthesised from the prefix when
/// it has not been seen yet and filled in if its own row comes later. Children keep
/// their full code, and deeper codes are not split further.
pub fn build_menu(modules: Vec<ModuleMenuUser>) -> Vec<MenuModule> {
    let mut roots: Vec<MenuModule> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for module in modules {
        match module.code.split_once('.') {
            None => match index.get(&module.code) {
                Some(&i) => fill_parent(&mut roots[i], module),
                None => {
                    index.insert(module.code.clone(), roots.len());
                    roots.push(module.into());
                }
            },
            Some((prefix, _)) => {
                let i = match index.get(prefix) {
                    Some(&i) => i,
                    None => {
                        index.insert(prefix.to_string(), roots.len());
                        roots.push(synthesised_parent(prefix, module.position));
                        roots.len() - 1
                    }
                };
                roots[i].modules.push(module.into());
            }
        }
    }

    roots
}

fn synthesised_parent(code: &str, position: i32) -> MenuModule {
    MenuModule {
        id: None,
        name: code.to_string(),
        description: None,
        code: code.to_string(),
        icon: None,
        position,
        created_at: None,
        views: Vec::new(),
        modules: Vec::new(),
    }
}

fn fill_parent(node: &mut MenuModule, module: ModuleMenuUser) {
    if node.id.is_none() {
        node.id = Some(module.id);
        node.name = module.name;
        node.description = module.description;
        node.icon = module.icon;
        node.position = module.position;
        node.created_at = Some(module.created_at);
    }
    for view in module.views {
        if !node.views.iter().any(|v| v.id == view.id) {
            node.views.push(view);
        }
    }
}
