//! Review panes shown to the operator while a form is filled.
//!
//! The caller owns a [`PreviewDeck`] for the whole session and pushes panes
//! into it; a [`ReviewPanel`] renders the deck somewhere the operator can see
//! it. Rendering is best effort: [`show_pane`] never fails.

use crate::record::{PolicyField, PolicyRecord};
use crate::result::DriverResult;
use async_trait::async_trait;
use serde::Serialize;

/// Title of the conditions pane
pub const CONDITIONS_TITLE: &str = "Condiciones (revisión)";
/// Title of the vehicle item pane
pub const VEHICLE_TITLE: &str = "Item Vehículo (revisión)";
/// Title of the costs pane
pub const COSTS_TITLE: &str = "Costos (revisión)";

/// One titled list of label/value rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewPane {
    pub title: String,
    pub rows: Vec<(String, String)>,
}

impl PreviewPane {
    #[must_use]
    pub fn new(title: impl Into<String>, rows: Vec<(String, String)>) -> Self {
        Self {
            title: title.into(),
            rows,
        }
    }

    /// Pane listing `fields` of `record`; absent values show as empty
    #[must_use]
    pub fn from_record(
        title: impl Into<String>,
        record: &PolicyRecord,
        fields: &[PolicyField],
    ) -> Self {
        let rows = fields
            .iter()
            .map(|f| {
                let value = record.get(*f).map(|v| v.to_string()).unwrap_or_default();
                (f.as_str().to_string(), value)
            })
            .collect();
        Self::new(title, rows)
    }
}

/// Ordered set of panes with one focused
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreviewDeck {
    panes: Vec<PreviewPane>,
    index: usize,
}

impl PreviewDeck {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pane with the same title, or append; either way the
    /// pane becomes the focused one
    pub fn upsert(&mut self, pane: PreviewPane) {
        if let Some(pos) = self.panes.iter().position(|p| p.title == pane.title) {
            self.panes[pos] = pane;
            self.index = pos;
        } else {
            self.panes.push(pane);
            self.index = self.panes.len() - 1;
        }
    }

    /// Focus the next pane, wrapping around
    pub fn next(&mut self) {
        if !self.panes.is_empty() {
            self.index = (self.index + 1) % self.panes.len();
        }
    }

    /// Focus the previous pane, wrapping around
    pub fn prev(&mut self) {
        if !self.panes.is_empty() {
            self.index = (self.index + self.panes.len() - 1) % self.panes.len();
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<&PreviewPane> {
        self.panes.get(self.index)
    }

    #[must_use]
    pub fn panes(&self) -> &[PreviewPane] {
        &self.panes
    }

    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.panes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.panes.is_empty()
    }

    /// Script that draws the deck as a fixed overlay with prev/next
    /// navigation. Re-running it replaces the previous overlay.
    #[must_use]
    pub fn render_script(&self) -> String {
        let deck = serde_json::json!({ "list": self.panes.iter().map(|p| {
            serde_json::json!({ "title": p.title, "rows": p.rows })
        }).collect::<Vec<_>>(), "index": self.index });
        format!("(function(deck){{{RENDERER}}})({deck})")
    }
}

const RENDERER: &str = r#"
var id='formwright-review-panel';
var host=document.getElementById(id);
if(!host){host=document.createElement('div');host.id=id;
host.style.cssText='position:fixed;top:12px;right:12px;z-index:2147483647;max-width:420px;min-width:260px;background:rgba(21,22,25,.92);color:#e9eef3;font:12px/1.35 system-ui,sans-serif;border-radius:10px;box-shadow:0 8px 24px rgba(0,0,0,.35);overflow:hidden';
document.documentElement.appendChild(host);}
window.__formwrightDeck=deck;
function esc(x){return String(x==null?'':x).replace(/&/g,'&amp;').replace(/</g,'&lt;').replace(/>/g,'&gt;');}
function draw(){var d=window.__formwrightDeck;var n=d.list.length;var p=n?d.list[d.index]:{title:'',rows:[]};
var body='';for(var i=0;i<p.rows.length;i++){body+='<tr><td style="padding:6px 8px;color:#b7c0c7;white-space:nowrap">'+esc(p.rows[i][0])+'</td><td style="padding:6px 8px;word-break:break-word">'+esc(p.rows[i][1])+'</td></tr>';}
host.innerHTML='<div style="display:flex;gap:8px;align-items:center;padding:8px 10px;background:#17181b"><button data-fw="prev">&#9664;</button><strong>'+esc(p.title)+'</strong><span style="margin-left:auto">'+(n?(d.index+1)+'/'+n:'')+'</span><button data-fw="next">&#9654;</button><button data-fw="close">&#215;</button></div><table style="border-collapse:collapse;width:100%">'+body+'</table>';
host.querySelector('[data-fw=prev]').onclick=function(){if(n){d.index=(d.index-1+n)%n;draw();}};
host.querySelector('[data-fw=next]').onclick=function(){if(n){d.index=(d.index+1)%n;draw();}};
host.querySelector('[data-fw=close]').onclick=function(){host.remove();};}
draw();
"#;

/// Renders a deck for the operator
#[async_trait]
pub trait ReviewPanel: Send + Sync {
    async fn render(&self, deck: &PreviewDeck) -> DriverResult<()>;
}

/// Push `pane` into the deck and render it; rendering failures are logged
/// and dropped.
pub async fn show_pane(panel: &dyn ReviewPanel, deck: &mut PreviewDeck, pane: PreviewPane) {
    let title = pane.title.clone();
    deck.upsert(pane);
    if let Err(err) = panel.render(deck).await {
        tracing::warn!(pane = %title, error = %err, "review panel render failed");
    }
}

/// Conditions-tab values
#[must_use]
pub fn conditions_pane(record: &PolicyRecord) -> PreviewPane {
    use PolicyField as F;
    PreviewPane::from_record(
        CONDITIONS_TITLE,
        record,
        &[
            F::Productor,
            F::Cliente,
            F::Aseguradora,
            F::Riesgo,
            F::Moneda,
            F::TipoContactoSsn,
            F::TipoIva,
            F::TipoRenovacion,
            F::ClausulaAjuste,
            F::CantCuotas,
            F::TipoVigencia,
            F::InicioVigencia,
            F::Refacturacion,
        ],
    )
}

/// Vehicle item values
#[must_use]
pub fn vehicle_pane(record: &PolicyRecord) -> PreviewPane {
    use PolicyField as F;
    PreviewPane::from_record(
        VEHICLE_TITLE,
        record,
        &[F::Anio, F::Marca, F::Patente, F::Chasis, F::Motor],
    )
}

/// Premium totals
#[must_use]
pub fn costs_pane(record: &PolicyRecord) -> PreviewPane {
    PreviewPane::from_record(
        COSTS_TITLE,
        record,
        &[PolicyField::PrimaTotal, PolicyField::PremioTotal],
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::result::DriverError;
    use std::sync::Mutex;

    fn pane(title: &str) -> PreviewPane {
        PreviewPane::new(title, vec![("k".to_string(), title.to_string())])
    }

    mod deck_tests {
        use super::*;

        #[test]
        fn test_upsert_appends_and_focuses() {
            let mut deck = PreviewDeck::new();
            deck.upsert(pane("a"));
            deck.upsert(pane("b"));
            assert_eq!(deck.len(), 2);
            assert_eq!(deck.current().unwrap().title, "b");
        }

        #[test]
        fn test_upsert_replaces_same_title() {
            let mut deck = PreviewDeck::new();
            deck.upsert(pane("a"));
            deck.upsert(pane("b"));
            deck.upsert(PreviewPane::new("a", vec![]));
            assert_eq!(deck.len(), 2);
            assert_eq!(deck.index(), 0);
            assert!(deck.current().unwrap().rows.is_empty());
        }

        #[test]
        fn test_navigation_wraps() {
            let mut deck = PreviewDeck::new();
            deck.next();
            deck.prev();
            assert!(deck.current().is_none());
            for t in ["a", "b", "c"] {
                deck.upsert(pane(t));
            }
            deck.next();
            assert_eq!(deck.current().unwrap().title, "a");
            deck.prev();
            assert_eq!(deck.current().unwrap().title, "c");
        }

        #[test]
        fn test_render_script_embeds_deck() {
            let mut deck = PreviewDeck::new();
            deck.upsert(pane("Costos"));
            let script = deck.render_script();
            assert!(script.contains("\"title\":\"Costos\""));
            assert!(script.contains("formwright-review-panel"));
        }
    }

    mod builder_tests {
        use super::*;

        #[test]
        fn test_conditions_pane_rows() {
            let record = PolicyRecord {
                cliente: Some("ACME S.A.".into()),
                cant_cuotas: Some(6),
                ..PolicyRecord::default()
            };
            let p = conditions_pane(&record);
            assert_eq!(p.title, CONDITIONS_TITLE);
            assert_eq!(p.rows.len(), 13);
            assert_eq!(p.rows[1], ("cliente".to_string(), "ACME S.A.".to_string()));
            assert!(p.rows.contains(&("cant_cuotas".to_string(), "6".to_string())));
            assert_eq!(p.rows[0].1, "");
        }

        #[test]
        fn test_vehicle_and_costs() {
            let record = PolicyRecord {
                patente: Some("AB123CD".into()),
                premio_total: Some(1200.5),
                ..PolicyRecord::default()
            };
            assert_eq!(vehicle_pane(&record).rows.len(), 5);
            assert_eq!(costs_pane(&record).rows[1].1, "1200.5");
        }
    }

    struct Recording {
        fail: bool,
        seen: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl ReviewPanel for Recording {
        async fn render(&self, deck: &PreviewDeck) -> DriverResult<()> {
            self.seen.lock().unwrap().push(deck.len());
            if self.fail {
                Err(DriverError::script("document is gone"))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_show_pane_renders_whole_deck() {
        let panel = Recording {
            fail: false,
            seen: Mutex::new(Vec::new()),
        };
        let mut deck = PreviewDeck::new();
        show_pane(&panel, &mut deck, pane("a")).await;
        show_pane(&panel, &mut deck, pane("b")).await;
        assert_eq!(*panel.seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_show_pane_swallows_render_failure() {
        let panel = Recording {
            fail: true,
            seen: Mutex::new(Vec::new()),
        };
        let mut deck = PreviewDeck::new();
        show_pane(&panel, &mut deck, pane("a")).await;
        assert_eq!(deck.len(), 1);
    }
}
