//! Fixed and adaptive crew rosters.

use crate::core::adaptive::{AgentProposal, CrewProposal};
use crate::core::types::AgentSpec;
use crate::io::config::ModelsConfig;

use super::Agent;

fn spec(role: &str, goal: &str, backstory: &str, model: &str) -> AgentSpec {
    AgentSpec {
        role: role.to_string(),
        goal: goal.to_string(),
        backstory: backstory.to_string(),
        model: model.to_string(),
    }
}

/// Agents of the code-writing pipeline.
#[derive(Debug, Clone)]
pub struct CodeCrew {
    pub manager: Agent,
    pub architect: Agent,
    pub designer: Agent,
    pub developer: Agent,
    pub reviewer: Agent,
}

pub fn code_crew(models: &ModelsConfig) -> CodeCrew {
    CodeCrew {
        manager: Agent::new(spec(
            "Project Manager",
            "Coordinate the software development process and ensure clear requirements",
            "You are an experienced project manager who excels at breaking down complex \
             requirements into clear, actionable tasks. You help the team stay organized and focused.",
            &models.manager,
        )),
        architect: Agent::new(spec(
            "Software Architect",
            "Design clean, maintainable software architecture",
            "You are a skilled software architect with years of experience designing robust \
             systems. You can identify the right patterns and structures for any project.",
            &models.architect,
        )),
        designer: Agent::new(spec(
            "UI/UX Designer",
            "Design intuitive, user-friendly interfaces that meet user requirements",
            "You are a talented UI/UX designer with a keen eye for aesthetics and usability. \
             You create designs that balance visual appeal with functionality.",
            &models.designer,
        )),
        developer: Agent::new(spec(
            "Developer",
            "Implement high-quality, working code",
            "You are a talented developer who writes clean, efficient, and well-documented code. \
             You have expertise in multiple programming languages and frameworks.",
            &models.developer,
        )),
        reviewer: Agent::new(spec(
            "Code Reviewer",
            "Ensure code quality, identify bugs, and suggest improvements",
            "You are a detail-oriented code reviewer with a keen eye for bugs, inefficiencies, \
             and improvements. You help maintain high code quality standards.",
            &models.reviewer,
        )),
    }
}

/// Scores finished stages for `--evaluate`.
pub fn evaluator(model: &str) -> Agent {
    Agent::new(spec(
        "Task Execution Evaluator",
        "Evaluate the performance of the agents in the crew on the tasks they performed, \
         scoring completion, quality and overall performance from 1 to 10",
        "You evaluate crew task outputs against their task descriptions and expected \
         outputs with precise, consistent judgement.",
        model,
    ))
}

/// Seat in the three-agent adaptive crew.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seat {
    Manager,
    Designer,
    Developer,
}

/// A task assigned to one adaptive seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub description: String,
    pub expected_output: String,
    pub seat: Seat,
}

/// Agents of the adaptive pipeline, all on one model.
#[derive(Debug, Clone)]
pub struct AdaptiveCrew {
    pub manager: Agent,
    pub designer: Agent,
    pub developer: Agent,
}

impl AdaptiveCrew {
    pub fn defaults(model: &str) -> Self {
        Self {
            manager: Agent::new(spec(
                "Project Manager",
                "Understand user requirements and coordinate the team to deliver the best solution",
                "You are an experienced project manager who excels at breaking down complex \
                 requirements into clear, actionable tasks. You're skilled at understanding user \
                 needs and coordinating team efforts.",
                model,
            )),
            designer: Agent::new(spec(
                "UI/UX Designer",
                "Design intuitive, user-friendly interfaces that meet user requirements and \
                 provide excellent user experiences",
                "You are a talented UI/UX designer with a keen eye for aesthetics and usability. \
                 You've designed successful interfaces for various applications and understand \
                 how to balance visual appeal with functionality.",
                model,
            )),
            developer: Agent::new(spec(
                "Software Developer",
                "Implement robust, efficient, and maintainable code that fulfills the requirements",
                "You are a skilled software developer with expertise in multiple programming \
                 languages and frameworks. You write clean, efficient code and are adept at \
                 troubleshooting and problem-solving.",
                model,
            )),
        }
    }

    /// Override persona fields the proposal filled in; blank fields keep defaults.
    pub fn configure(&mut self, proposal: &CrewProposal) {
        apply(&mut self.manager, &proposal.manager);
        apply(&mut self.designer, &proposal.designer);
        apply(&mut self.developer, &proposal.developer);
    }

    pub fn agent(&self, seat: Seat) -> &Agent {
        match seat {
            Seat::Manager => &self.manager,
            Seat::Designer => &self.designer,
            Seat::Developer => &self.developer,
        }
    }

    pub fn agents(&self) -> [&Agent; 3] {
        [&self.manager, &self.designer, &self.developer]
    }
}

fn apply(agent: &mut Agent, proposal: &AgentProposal) {
    let fields = [
        (&mut agent.spec.role, &proposal.role),
        (&mut agent.spec.goal, &proposal.goal),
        (&mut agent.spec.backstory, &proposal.backstory),
    ];
    for (current, proposed) in fields {
        let proposed = proposed.trim();
        if !proposed.is_empty() {
            *current = proposed.to_string();
        }
    }
}

/// Tasks to run, Manager's first, then Designer's, then Developer's.
///
/// A proposal without any task gets one default task per seat.
pub fn adaptive_tasks(proposal: &CrewProposal, user_prompt: &str) -> Vec<TaskSpec> {
    if proposal.task_count() == 0 {
        let prompt = user_prompt.trim();
        return vec![
            task(Seat::Manager, &format!("Analyze the requirements and plan the work for: {prompt}")),
            task(Seat::Designer, &format!("Design the user experience for: {prompt}")),
            task(Seat::Developer, &format!("Implement a working solution for: {prompt}")),
        ];
    }

    let seats = [
        (Seat::Manager, &proposal.manager.tasks),
        (Seat::Designer, &proposal.designer.tasks),
        (Seat::Developer, &proposal.developer.tasks),
    ];
    seats
        .into_iter()
        .flat_map(|(seat, tasks)| tasks.iter().map(move |description| task(seat, description)))
        .collect()
}

fn task(seat: Seat, description: &str) -> TaskSpec {
    let lowered = description.to_lowercase();
    let expected_output = match seat {
        Seat::Manager => format!("Detailed analysis and plan for {lowered}"),
        Seat::Designer => {
            format!("Comprehensive design and user experience solution for {lowered}")
        }
        Seat::Developer => format!("Implementation plan and code architecture for {lowered}"),
    };
    TaskSpec {
        description: description.to_string(),
        expected_output,
        seat,
    }
}
