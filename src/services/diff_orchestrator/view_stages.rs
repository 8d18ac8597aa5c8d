// ビューの削除と再作成
//
// 依存先が変更されたビューも削除対象に含め、削除集合が変化しなくなるまで広げる。

use super::{DiffContext, StageSink};
use crate::core::object_ref::ViewRef;
use crate::core::operation::{Operation, QualifiedName};
use crate::core::stage::Stage;
use std::collections::HashSet;
use tracing::debug;

fn dependency_names(view: ViewRef<'_>) -> Vec<QualifiedName> {
    view.view
        .depends_on
        .iter()
        .map(|d| {
            QualifiedName::new(
                d.schema.as_deref().unwrap_or(&view.schema.name),
                &d.view,
            )
        })
        .collect()
}

fn find_view<'a>(views: &[ViewRef<'a>], name: &QualifiedName) -> Option<ViewRef<'a>> {
    views
        .iter()
        .copied()
        .find(|v| v.schema.name == name.schema && v.view.name == name.name)
}

fn same_view(old: ViewRef<'_>, new: ViewRef<'_>) -> bool {
    old.view.query.trim() == new.view.query.trim()
        && dependency_names(old) == dependency_names(new)
}

/// 削除するビューを決定して Stage1 に出力
///
/// # Returns
///
/// 削除したビューの名前
pub(super) fn drop_views(
    sink: &mut StageSink<'_>,
    dc: &DiffContext<'_>,
) -> HashSet<QualifiedName> {
    let mut dropped: HashSet<QualifiedName> = HashSet::new();

    loop {
        let mut changed = false;
        for &old in &dc.old_views {
            let name = QualifiedName::from(old);
            if dropped.contains(&name) {
                continue;
            }
            let replaced = match find_view(&dc.new_views, &name) {
                None => true,
                Some(new) => !same_view(old, new),
            };
            let dependency_dropped = dependency_names(old).iter().any(|d| dropped.contains(d));
            if dc.ctx.always_recreate_views || replaced || dependency_dropped {
                dropped.insert(name);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    // 依存するビューから先に削除する
    for &old in dc.old_views.iter().rev() {
        let name = QualifiedName::from(old);
        if dropped.contains(&name) {
            sink.emit(Stage::Stage1, &Operation::DropView { name });
        }
    }

    if !dropped.is_empty() {
        debug!(views = dropped.len(), "Dropping changed views");
    }
    dropped
}

/// 新規・変更されたビューを Stage3 に作成
pub(super) fn create_views(
    sink: &mut StageSink<'_>,
    dc: &DiffContext<'_>,
    dropped: &HashSet<QualifiedName>,
) {
    for &new in &dc.new_views {
        let name = QualifiedName::from(new);
        let exists = find_view(&dc.old_views, &name).is_some();
        if !exists || dropped.contains(&name) {
            sink.emit(
                Stage::Stage3,
                &Operation::CreateView {
                    name,
                    query: new.view.query.clone(),
                },
            );
        }
    }
}

/// 構築時はすべてのビューを依存順に作成
pub(super) fn build_views(sink: &mut StageSink<'_>, views: &[ViewRef<'_>]) {
    for &view in views {
        sink.emit(
            Stage::Stage3,
            &Operation::CreateView {
                name: QualifiedName::from(view),
                query: view.view.query.clone(),
            },
        );
    }
}
