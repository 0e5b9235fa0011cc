use leadscout_common::Criteria;

/// A platform-specific discovery strategy. Each agent knows how to ask the
/// model for a search query tuned to its platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Agent {
    Google,
    Facebook,
    LinkedIn,
    Twitter,
    Instagram,
    Freelance,
}

impl Agent {
    pub const ALL: [Agent; 6] = [
        Agent::Google,
        Agent::Facebook,
        Agent::LinkedIn,
        Agent::Twitter,
        Agent::Instagram,
        Agent::Freelance,
    ];

    /// Wire identifier, as accepted in job submissions.
    pub fn id(&self) -> &'static str {
        match self {
            Agent::Google => "google",
            Agent::Facebook => "facebook",
            Agent::LinkedIn => "linkedin",
            Agent::Twitter => "twitter",
            Agent::Instagram => "instagram",
            Agent::Freelance => "freelance",
        }
    }

    pub fn parse(s: &str) -> Option<Agent> {
        Agent::ALL.iter().copied().find(|a| a.id() == s.trim().to_lowercase())
    }

    /// The `site:` constraint appended to sanitized queries, if the platform
    /// has one.
    pub fn site_anchor(&self) -> Option<&'static str> {
        match self {
            Agent::Google => None,
            Agent::Facebook => Some("facebook.com"),
            Agent::LinkedIn => Some("linkedin.com"),
            Agent::Twitter => Some("x.com"),
            Agent::Instagram => Some("instagram.com"),
            Agent::Freelance => Some("upwork.com"),
        }
    }

    /// The platform-specific instruction handed to the query-writing model.
    pub fn query_instruction(&self, c: &Criteria) -> String {
        let Criteria {
            service,
            industry,
            location,
        } = c;
        match self {
            Agent::Google => format!(
                "Generate a single Google search query to find small-to-medium businesses \
                 in the industry below that are likely to need help with this service.\n\n\
                 Service: {service}\nIndustry: {industry}\nLocation: {location}\n\n\
                 Output only the final Google query string."
            ),
            Agent::Facebook => format!(
                "Generate a single Google search query that finds Facebook pages of businesses \
                 in the given industry and location that are likely to need the given service.\n\n\
                 Service: {service}\nIndustry: {industry}\nLocation: {location}\n\n\
                 Rules for the query:\n\
                 - Must include site:facebook.com\n\
                 - Must include business context: (\"small business\" OR \"local business\" OR \"official page\")\n\
                 - Must include contact intent: (\"contact\" OR \"about\" OR \"call\" OR \"email\")\n\
                 - Must include industry: \"{industry}\"\n\
                 - Must include location: (\"{location}\" OR nearby city/region terms)\n\
                 - Exclude groups, communities, agencies, influencers: \
                   -inurl:groups -inurl:community -inurl:agency -inurl:influencer\n\
                 - Return ONLY the final query string, no explanation."
            ),
            Agent::LinkedIn => format!(
                "Craft a single Google search query targeting LinkedIn pages of real businesses \
                 or business decision-makers who may need the given service.\n\n\
                 Service: {service}\nIndustry: {industry}\nLocation: {location}\n\n\
                 Rules for the query:\n\
                 - Must include site:linkedin.com/company or site:linkedin.com/posts\n\
                 - Must include industry: \"{industry}\"\n\
                 - Must include service intent: (\"need {service}\" OR \"looking for {service}\" OR \"hiring {service}\")\n\
                 - Must include location: (\"{location}\" OR nearby region terms)\n\
                 - Must include contact/business context: (\"owner\" OR \"founder\" OR \"CEO\" OR \"about\" OR \"contact\")\n\
                 - Exclude agencies, recruiters, consultants and job postings: \
                   -\"agency\" -\"consultant\" -\"recruiter\" -\"job\"\n\
                 - Return ONLY the final query string, no explanation."
            ),
            Agent::Twitter => format!(
                "Craft a single Google search query to find real businesses, business owners, \
                 founders, or CEOs active on Twitter (X) who may need the given service.\n\n\
                 Service: {service}\nIndustry: {industry}\nLocation: {location}\n\n\
                 Rules for the query:\n\
                 - Must include: (site:x.com OR site:twitter.com)\n\
                 - Must include industry: \"{industry}\"\n\
                 - Must include service intent: (\"need {service}\" OR \"looking for {service}\" OR \"help with {service}\")\n\
                 - Must include business/owner context: (\"business\" OR \"founder\" OR \"owner\" OR \"CEO\")\n\
                 - Must include location: (\"{location}\" OR nearby city/region terms)\n\
                 - Exclude agencies, freelancers and job spam: \
                   -\"agency\" -\"consultant\" -\"freelancer\" -\"jobs\"\n\
                 - Return ONLY the final query string, no explanation."
            ),
            Agent::Instagram => format!(
                "Craft a single Google search query that finds Instagram accounts of businesses \
                 in the given industry and location that are likely to need the given service.\n\n\
                 Service: {service}\nIndustry: {industry}\nLocation: {location}\n\n\
                 Rules for the query:\n\
                 - Must include site:instagram.com\n\
                 - Must include business context: (\"small business\" OR \"official\" OR \"business profile\")\n\
                 - Must include contact intent: (\"contact\" OR \"about us\" OR \"call\" OR \"email\")\n\
                 - Must include industry: \"{industry}\"\n\
                 - Must include location: (\"{location}\" OR nearby city/region terms)\n\
                 - Exclude influencers, agencies, personal accounts: \
                   -inurl:agency -inurl:influencer -inurl:personal\n\
                 - Return ONLY the final query string, no explanation."
            ),
            Agent::Freelance => format!(
                "Generate a single Google search query to find active freelance projects, gigs, \
                 or client postings in the given industry and location that may require the \
                 specified service.\n\n\
                 Service: {service}\nIndustry: {industry}\nLocation: {location}\n\n\
                 Rules for the query:\n\
                 - Must include freelance platforms: (site:upwork.com OR site:fiverr.com OR site:freelancer.com)\n\
                 - Must include project intent: (\"looking for {service}\" OR \"need {service}\" OR \"hire for {service}\")\n\
                 - Must include business/client context: (\"company\" OR \"startup\" OR \"small business\")\n\
                 - Must include location: (\"{location}\" OR nearby city/region terms)\n\
                 - Exclude freelancer profiles or portfolios: -\"profile\" -\"portfolio\" -\"resume\"\n\
                 - Return ONLY the final query string, no explanation."
            ),
        }
    }
}

impl std::fmt::Display for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Agent::Google => write!(f, "Google"),
            Agent::Facebook => write!(f, "Facebook"),
            Agent::LinkedIn => write!(f, "LinkedIn"),
            Agent::Twitter => write!(f, "Twitter"),
            Agent::Instagram => write!(f, "Instagram"),
            Agent::Freelance => write!(f, "Freelance"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_known_ids() {
        assert_eq!(Agent::parse("google"), Some(Agent::Google));
        assert_eq!(Agent::parse(" LinkedIn "), Some(Agent::LinkedIn));
        assert_eq!(Agent::parse("myspace"), None);
    }

    #[test]
    fn instruction_carries_all_criteria() {
        let c = Criteria::new("web design", "plumbing", "Austin");
        for agent in Agent::ALL {
            let instruction = agent.query_instruction(&c);
            assert!(instruction.contains("web design"), "{agent} missing service");
            assert!(instruction.contains("plumbing"), "{agent} missing industry");
            assert!(instruction.contains("Austin"), "{agent} missing location");
        }
    }
}
