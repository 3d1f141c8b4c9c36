//! Per-project digest emails: one message per project per sweep,
//! tasks ordered most severe first.

use chrono::NaiveDate;

use crate::escalate::Tier;

/// One row of the digest table.
#[derive(Debug, Clone)]
pub struct DigestEntry {
    pub description: String,
    pub deadline: NaiveDate,
    pub days_overdue: i64,
    pub tier: Tier,
}

/// All firing alerts for one project, collapsed into a single email.
#[derive(Debug, Clone)]
pub struct ProjectDigest {
    pub project_id: i64,
    pub project_name: String,
    pub client: String,
    pub entries: Vec<DigestEntry>,
}

impl ProjectDigest {
    pub fn new(project_id: i64, project_name: String, client: String) -> Self {
        Self {
            project_id,
            project_name,
            client,
            entries: Vec::new(),
        }
    }

    /// Most severe tier first; within a tier, most overdue first.
    pub fn sort_entries(&mut self) {
        self.entries
            .sort_by_key(|e| (e.tier.severity_rank(), -e.days_overdue));
    }

    fn critical_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.tier == Tier::CriticalDaily)
            .count()
    }

    pub fn subject(&self) -> String {
        let critical = self.critical_count();
        if critical > 0 {
            format!(
                "🆘 AgendaWorks | {} - {} task(s) need attention, {} critical",
                self.project_name,
                self.entries.len(),
                critical
            )
        } else {
            format!(
                "⚠️ AgendaWorks | {} - {} task(s) need attention",
                self.project_name,
                self.entries.len()
            )
        }
    }

    pub fn html_body(&self) -> String {
        let mut rows = String::new();
        for entry in &self.entries {
            let (color, overdue) = match entry.tier {
                Tier::CriticalDaily => ("#c0392b", format!("{} day(s) overdue", entry.days_overdue)),
                Tier::LastDay => ("#e67e22", "due today".to_string()),
                Tier::Reiteration(_) => ("#d4ac0d", format!("{} day(s) overdue", entry.days_overdue)),
            };
            rows.push_str(&format!(
                "<tr>\
                 <td style=\"padding:6px 12px;border-bottom:1px solid #eee;\">{}</td>\
                 <td style=\"padding:6px 12px;border-bottom:1px solid #eee;\">{}</td>\
                 <td style=\"padding:6px 12px;border-bottom:1px solid #eee;color:{color};font-weight:bold;\">{}</td>\
                 <td style=\"padding:6px 12px;border-bottom:1px solid #eee;\">{}</td>\
                 </tr>",
                entry.description,
                entry.deadline.format("%Y-%m-%d"),
                entry.tier.label(),
                overdue,
            ));
        }

        format!(
            "<html><body style=\"font-family:Arial,sans-serif;color:#2c3e50;\">\
             <h2 style=\"color:#2c3e50;\">📋 {name}</h2>\
             <p>Client: <b>{client}</b></p>\
             <p>The following checklist tasks need attention:</p>\
             <table style=\"border-collapse:collapse;width:100%;\">\
             <tr style=\"background:#f4f6f7;text-align:left;\">\
             <th style=\"padding:6px 12px;\">Task</th>\
             <th style=\"padding:6px 12px;\">Deadline</th>\
             <th style=\"padding:6px 12px;\">Alert</th>\
             <th style=\"padding:6px 12px;\">Status</th>\
             </tr>{rows}</table>\
             <p style=\"color:#7f8c8d;font-size:12px;\">\
             Automated message from AgendaWorks. Do not reply.</p>\
             </body></html>",
            name = self.project_name,
            client = self.client,
        )
    }
}
